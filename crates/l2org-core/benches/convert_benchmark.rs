use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use l2org_core::{Converter, Parser};

const LATEX_SAMPLE: &str = r"\documentclass[11pt]{article}
\usepackage{amsmath}
\usepackage{graphicx}
\title{Conversion Benchmark}
\author{A. Author}

\begin{document}
\section{Introduction}

This is a paragraph with \emph{emphasis}, \textbf{bold} text and inline
math $\alpha + \beta = \gamma$. Prior work~\cite{smith2020,jones2021}
covers the basics; see also \citep[ch.~3]{knuth1984}.

\subsection{Lists}

\begin{itemize}
  \item First item with \texttt{code}
  \item Second item, see Section~\ref{sec:method}
  \begin{enumerate}
    \item Nested one
    \item Nested two
  \end{enumerate}
\end{itemize}

\begin{description}
  \item[Term] A definition of the term.
\end{description}

% A comment line
\section{Method}\label{sec:method}

\begin{table}[h]
  \centering
  \begin{tabular}{lcr}
    a & b & c \\
    1 & 2 & 3 \\
  \end{tabular}
  \caption{A table}
\end{table}

\begin{equation}
  E = mc^2
\end{equation}

\begin{quote}
A quotation with a citation \cite{doe2019}.
\end{quote}

\begin{verbatim}
* not a heading
fn main() {}
\end{verbatim}

\bibliographystyle{plain}
\bibliography{refs}
\end{document}
";

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");

    group.throughput(Throughput::Bytes(LATEX_SAMPLE.len() as u64));
    group.bench_function("parse", |b| {
        b.iter(|| {
            let result = Parser::default().parse(black_box(LATEX_SAMPLE));
            black_box(result.document.blocks.len())
        })
    });

    let converter = Converter::default();
    group.bench_function("convert_str", |b| {
        b.iter(|| {
            let conversion = converter.convert_str(black_box(LATEX_SAMPLE));
            black_box(conversion.org.len())
        })
    });

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");
    let converter = Converter::default();

    // The sample body repeated; only the first copy has a preamble.
    let body = LATEX_SAMPLE
        .split_once("\\begin{document}\n")
        .map(|(_, body)| body)
        .unwrap_or(LATEX_SAMPLE);

    for size in [1, 5, 10, 20].iter() {
        let content: String = body.repeat(*size);

        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::new("convert", size), &content, |b, content| {
            b.iter(|| {
                let conversion = converter.convert_str(black_box(content));
                black_box(conversion.org.len())
            })
        });
    }

    group.finish();
}

fn bench_inline_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline");

    let inline = "This has \\emph{emphasis}, \\textbf{strong}, \\texttt{code}, $x + y$, \
                  \\href{https://example.com}{a link} and {\\it old style}.";

    group.bench_function("parse_inlines", |b| {
        b.iter(|| {
            let inlines = l2org_core::inline::parse_inlines(black_box(inline), 0);
            black_box(inlines.len())
        })
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let org = Converter::default().convert_str(LATEX_SAMPLE).org;
    c.bench_function("org_to_latex", |b| {
        b.iter(|| black_box(l2org_core::extract::org_to_latex(black_box(&org)).len()))
    });
}

criterion_group!(
    benches,
    bench_convert,
    bench_scaling,
    bench_inline_parsing,
    bench_round_trip
);
criterion_main!(benches);
