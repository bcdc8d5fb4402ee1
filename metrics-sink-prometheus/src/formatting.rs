//! Helpers for rendering metrics in the Prometheus exposition format.

use std::io;

use crate::record::MetricKind;
use crate::store::{LabelSet, MetricFamily};

/// Content type of the rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders the given families in the Prometheus [exposition format].
///
/// Each family with at least one sample gets a `# TYPE` line followed by one line per sample.
/// Families without samples are skipped entirely, so rendering nothing yields an empty string.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn render(families: &[MetricFamily]) -> String {
    let mut output = String::new();

    for family in families {
        if family.is_empty() {
            continue;
        }

        write_type_line(&mut output, family.name(), family.kind());
        for sample in family.samples() {
            write_metric_line(&mut output, family.name(), sample.labels(), sample.value());
        }
        output.push('\n');
    }

    output
}

/// Renders the given families and writes them to `writer`.
///
/// The output is fully rendered before anything is written, and then handed over in a single
/// `write_all` call.
///
/// ## Errors
///
/// If the writer fails, the error is returned as-is.
pub fn write_to<W>(families: &[MetricFamily], writer: &mut W) -> io::Result<()>
where
    W: io::Write,
{
    let output = render(families);
    writer.write_all(output.as_bytes())?;
    writer.flush()
}

/// Writes a metric type line in the Prometheus [exposition format].
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_type_line(buffer: &mut String, name: &str, kind: MetricKind) {
    buffer.push_str("# TYPE ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(kind.as_str());
    buffer.push('\n');
}

/// Writes a metric in the Prometheus [exposition format].
///
/// Label keys are written as-is, and are expected to already be valid.  Label values are escaped.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_metric_line(buffer: &mut String, name: &str, labels: &LabelSet, value: f64) {
    buffer.push_str(name);

    if !labels.is_empty() {
        buffer.push('{');

        let mut first = true;
        for (key, value) in labels.iter() {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            buffer.push_str(key);
            buffer.push_str("=\"");
            buffer.push_str(&escape_label_value(value));
            buffer.push('"');
        }

        buffer.push('}');
    }

    buffer.push(' ');
    write_value(buffer, value);
    buffer.push('\n');
}

/// Writes a sample value.
///
/// Integral values are written without a fractional part, and all other finite values use the
/// shortest representation that parses back to the same `f64`.
fn write_value(buffer: &mut String, value: f64) {
    if value.is_nan() {
        buffer.push_str("NaN");
    } else if value.is_infinite() {
        buffer.push_str(if value.is_sign_positive() { "+Inf" } else { "-Inf" });
    } else {
        buffer.push_str(value.to_string().as_str());
    }
}

/// Sanitizes a label key to be valid under the Prometheus [data model].
///
/// [data model]: https://prometheus.io/docs/concepts/data_model/#metric-names-and-labels
pub fn sanitize_label_key(key: &str) -> String {
    // The first character must be [a-zA-Z_], and all subsequent characters must be [a-zA-Z0-9_].
    let sanitized: String = key
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 && valid_label_key_start_character(c)
                || i != 0 && valid_label_key_character(c)
            {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "_".to_owned()
    } else {
        sanitized
    }
}

/// Escapes a label value for the Prometheus [exposition format].
///
/// All Unicode characters are valid, but backslashes, double quotes, and line feeds must be
/// escaped.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[inline]
fn valid_label_key_start_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z_].
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn valid_label_key_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-zA-Z0-9_].
    c.is_ascii_alphanumeric() || c == '_'
}
