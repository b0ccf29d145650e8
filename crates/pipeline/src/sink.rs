//! Output and audit sink capabilities.
//!
//! A batch initializes its output sink once, adds one record per produced
//! row and submits at the end. Audit records are logged per row and flushed
//! at the end. Sink failures are reported to the caller of the sink, which
//! logs them; they never fail a row.

use std::collections::BTreeMap;
use std::io::Write;

use tally_eval::{DeclaredType, DynamicValue};

use crate::audit::RowAuditRecord;
use crate::response::render_json_line;

/// A produced row: output key → classified value.
pub type OutputRecord = BTreeMap<String, DynamicValue>;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("output sink used before init")]
    NotInitialized,
}

pub trait OutputSink {
    fn init(
        &mut self,
        pipeline_id: &str,
        execution_id: &str,
        chunk_no: u32,
        output_types: &BTreeMap<String, DeclaredType>,
    ) -> Result<(), SinkError>;

    fn add_record(&mut self, record: OutputRecord) -> Result<(), SinkError>;

    fn submit(&mut self) -> Result<(), SinkError>;
}

pub trait AuditSink {
    fn log(&mut self, record: RowAuditRecord) -> Result<(), SinkError>;

    fn flush_sync(&mut self) -> Result<(), SinkError>;
}

// ──────────────────────────────────────────────
// In-memory sinks
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryOutput {
    pub pipeline_id: Option<String>,
    pub execution_id: Option<String>,
    pub chunk_no: u32,
    pub output_types: BTreeMap<String, DeclaredType>,
    pub records: Vec<OutputRecord>,
    pub submitted: bool,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemoryOutput {
    fn init(
        &mut self,
        pipeline_id: &str,
        execution_id: &str,
        chunk_no: u32,
        output_types: &BTreeMap<String, DeclaredType>,
    ) -> Result<(), SinkError> {
        self.pipeline_id = Some(pipeline_id.to_string());
        self.execution_id = Some(execution_id.to_string());
        self.chunk_no = chunk_no;
        self.output_types = output_types.clone();
        Ok(())
    }

    fn add_record(&mut self, record: OutputRecord) -> Result<(), SinkError> {
        if self.pipeline_id.is_none() {
            return Err(SinkError::NotInitialized);
        }
        self.records.push(record);
        Ok(())
    }

    fn submit(&mut self) -> Result<(), SinkError> {
        self.submitted = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryAudit {
    pub records: Vec<RowAuditRecord>,
    pub flushed: bool,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAudit {
    fn log(&mut self, record: RowAuditRecord) -> Result<(), SinkError> {
        self.records.push(record);
        Ok(())
    }

    fn flush_sync(&mut self) -> Result<(), SinkError> {
        self.flushed = true;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn init(
        &mut self,
        _: &str,
        _: &str,
        _: u32,
        _: &BTreeMap<String, DeclaredType>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    fn add_record(&mut self, _: OutputRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn submit(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl AuditSink for NullSink {
    fn log(&mut self, _: RowAuditRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn flush_sync(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ──────────────────────────────────────────────
// JSON-lines sinks
// ──────────────────────────────────────────────

/// Writes each output record as one JSON object per line. Keys follow the
/// headers given to [`JsonLinesOutput::with_headers`], or the sorted output
/// types when none were given; keys outside both come last.
pub struct JsonLinesOutput<W: Write> {
    writer: W,
    declared: Option<Vec<String>>,
    headers: Option<Vec<String>>,
    error_placeholder: String,
}

impl<W: Write> JsonLinesOutput<W> {
    pub fn new(writer: W, error_placeholder: &str) -> Self {
        JsonLinesOutput {
            writer,
            declared: None,
            headers: None,
            error_placeholder: error_placeholder.to_string(),
        }
    }

    /// Key order for every line, usually the request's output declaration
    /// order.
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.declared = Some(headers);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for JsonLinesOutput<W> {
    fn init(
        &mut self,
        _pipeline_id: &str,
        _execution_id: &str,
        _chunk_no: u32,
        output_types: &BTreeMap<String, DeclaredType>,
    ) -> Result<(), SinkError> {
        self.headers = Some(match &self.declared {
            Some(declared) => declared.clone(),
            None => output_types.keys().cloned().collect(),
        });
        Ok(())
    }

    fn add_record(&mut self, record: OutputRecord) -> Result<(), SinkError> {
        let headers = self.headers.as_ref().ok_or(SinkError::NotInitialized)?;
        let mut keys: Vec<String> = headers.clone();
        keys.extend(record.keys().filter(|k| !headers.contains(k)).cloned());
        let line = render_json_line(&record, &keys, &self.error_placeholder);
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn submit(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes each audit record as one JSON object per line.
pub struct JsonLinesAudit<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesAudit<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesAudit { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AuditSink for JsonLinesAudit<W> {
    fn log(&mut self, record: RowAuditRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(&record)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    fn flush_sync(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_eval::ValueMap;

    fn types() -> BTreeMap<String, DeclaredType> {
        let mut t = BTreeMap::new();
        t.insert("kwh".to_string(), DeclaredType::Number);
        t.insert("site".to_string(), DeclaredType::String);
        t
    }

    #[test]
    fn memory_output_requires_init() {
        let mut sink = MemoryOutput::new();
        assert!(matches!(
            sink.add_record(OutputRecord::new()),
            Err(SinkError::NotInitialized)
        ));
        sink.init("p1", "e1", 3, &types()).unwrap();
        sink.add_record(OutputRecord::new()).unwrap();
        sink.submit().unwrap();
        assert_eq!(sink.chunk_no, 3);
        assert_eq!(sink.records.len(), 1);
        assert!(sink.submitted);
    }

    #[test]
    fn json_lines_output() {
        let mut sink = JsonLinesOutput::new(Vec::new(), "___ERROR___");
        sink.init("p1", "e1", 0, &types()).unwrap();
        let mut record = OutputRecord::new();
        record.insert("site".into(), DynamicValue::string("north"));
        record.insert("kwh".into(), DynamicValue::error("bad"));
        sink.add_record(record).unwrap();
        sink.submit().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\"kwh\":\"___ERROR___\",\"site\":\"north\"}\n");
    }

    #[test]
    fn json_lines_output_follows_declared_headers() {
        let mut sink = JsonLinesOutput::new(Vec::new(), "___ERROR___")
            .with_headers(vec!["site".into(), "kwh".into()]);
        sink.init("p1", "e1", 0, &types()).unwrap();
        let mut record = OutputRecord::new();
        record.insert("kwh".into(), DynamicValue::number(12.into()));
        record.insert("site".into(), DynamicValue::string("north"));
        record.insert("extra".into(), DynamicValue::string("x"));
        sink.add_record(record).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\"site\":\"north\",\"kwh\":12,\"extra\":\"x\"}\n");
    }

    #[test]
    fn json_lines_audit() {
        let mut sink = JsonLinesAudit::new(Vec::new());
        sink.log(RowAuditRecord::new("p1", "e1", "a1", 0, &ValueMap::new()))
            .unwrap();
        sink.flush_sync().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(v["auditId"], "a1");
    }
}
