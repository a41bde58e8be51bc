//! Text cleanup for candidate tool payloads.
//!
//! Small models wrap JSON in byte-order marks, stray control bytes, and
//! typographic quotes. One left-to-right pass removes or maps those so the
//! validator sees what the model meant.

const BOM: char = '\u{FEFF}';

/// Counts of what a sanitize pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Characters dropped (BOM, NUL, control)
    pub removed: usize,
    /// Typographic quotes mapped to ASCII
    pub replaced: usize,
}

impl SanitizeReport {
    /// Whether the pass left the input untouched
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.removed == 0 && self.replaced == 0
    }
}

/// Clean a candidate JSON string.
///
/// Drops BOM and NUL characters and ASCII control characters other than
/// tab, newline and carriage return; maps curly double quotes to `"` and
/// curly single quotes to `'`. Everything else passes through. Idempotent.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_report(input).0
}

/// Like [`sanitize`], also reporting what changed
#[must_use]
pub fn sanitize_with_report(input: &str) -> (String, SanitizeReport) {
    let mut report = SanitizeReport::default();
    if input.is_empty() {
        return (String::new(), report);
    }

    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            // Every BOM goes, not just a leading one; otherwise a doubled
            // BOM would survive the first pass.
            BOM | '\0' => report.removed += 1,
            '\u{201C}' | '\u{201D}' => {
                out.push('"');
                report.replaced += 1;
            }
            '\u{2018}' | '\u{2019}' => {
                out.push('\'');
                report.replaced += 1;
            }
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => report.removed += 1,
            c => out.push(c),
        }
    }

    (out, report)
}
