//! Generated G-code output container.

use crate::Result;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The result of the emission process: a complete G-code file that can
/// be written to disk or sent to a printer.
#[derive(Clone, Default)]
pub struct GCode {
    content: String,
}

impl GCode {
    /// Create a new empty GCode.
    pub fn new() -> Self {
        Self {
            content: String::new(),
        }
    }

    /// Create a GCode from a string.
    pub fn from_string(content: String) -> Self {
        Self { content }
    }

    /// Get the G-code content as a string.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Get the length of the G-code content in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Check if the G-code is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Get the number of lines in the G-code.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Iterate over the lines of the G-code.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines()
    }

    /// Write the G-code to a file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.content.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for GCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GCode({} bytes, {} lines)", self.len(), self.line_count())
    }
}

impl fmt::Display for GCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl From<GCode> for String {
    fn from(gcode: GCode) -> Self {
        gcode.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcode_from_string() {
        let gcode = GCode::from_string("G28\nG1 X10\n".to_string());
        assert_eq!(gcode.line_count(), 2);
        assert!(!gcode.is_empty());
    }

    #[test]
    fn test_gcode_lines_iterator() {
        let gcode = GCode::from_string("G28\nG1 X10\nG1 Y20\n".to_string());
        let lines: Vec<&str> = gcode.lines().collect();
        assert_eq!(lines, vec!["G28", "G1 X10", "G1 Y20"]);
    }
}
