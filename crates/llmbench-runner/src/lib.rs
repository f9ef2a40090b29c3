pub mod backend;
pub mod invoker;
pub mod ollama;
pub mod report;
pub mod runner;

#[cfg(test)]
mod testing;

pub use backend::{Blocking, BlockingBackend, InferenceBackend, TextStream};
pub use invoker::{BoundedInvoker, InvokeSettings};
pub use ollama::{ndjson_text_stream, OllamaClient, OllamaModel};
pub use report::{report_file_name, JsonReportSink, ReportSink};
pub use runner::{BenchmarkEvent, BenchmarkRunner, RunnerSettings};
