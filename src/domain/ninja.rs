//! Ninja build file writer
//!
//! Produces the textual build graph consumed by the ninja build engine.
//! Everything is written into an in-memory buffer; the caller decides when
//! (and whether) the buffer reaches the disk.

use std::fmt::Write as _;
use std::path::Path;

/// Maximum line width before long statements are wrapped with `$`
const LINE_WIDTH: usize = 78;

/// Escapes a path for use in a build statement (`$`, space and `:`)
pub fn escape_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '$' => escaped.push_str("$$"),
            ' ' => escaped.push_str("$ "),
            ':' => escaped.push_str("$:"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escapes a value for use on the right side of a variable binding
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

/// Returns true if `name` can be used as a rule or variable name
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// A rule declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<String>,
}

/// Buffered writer for ninja syntax
#[derive(Debug, Default)]
pub struct NinjaWriter {
    buffer: String,
}

impl NinjaWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a `#` comment line
    pub fn comment(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            let _ = writeln!(self.buffer, "# {}", line);
        }
        self
    }

    /// Writes an empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buffer.push('\n');
        self
    }

    /// Writes a top-level variable binding; the value is taken verbatim
    pub fn variable(&mut self, key: &str, value: &str) -> &mut Self {
        self.binding(0, key, value)
    }

    /// Writes a rule block
    pub fn rule(&mut self, rule: &Rule) -> &mut Self {
        let _ = writeln!(self.buffer, "rule {}", rule.name);
        self.binding(1, "command", &rule.command);
        if let Some(description) = &rule.description {
            self.binding(1, "description", description);
        }
        if let Some(depfile) = &rule.depfile {
            self.binding(1, "depfile", depfile);
        }
        self
    }

    /// Writes a build statement; paths are escaped here
    pub fn build<P: AsRef<Path>>(
        &mut self,
        outputs: &[P],
        rule: &str,
        inputs: &[P],
        implicit: &[P],
        variables: &[(&str, String)],
    ) -> &mut Self {
        let mut words: Vec<String> = Vec::new();
        words.push("build".to_string());

        let mut outputs: Vec<String> = outputs.iter().map(|p| escape_path(p.as_ref())).collect();
        if let Some(last) = outputs.last_mut() {
            last.push(':');
        }
        words.extend(outputs);
        words.push(rule.to_string());
        words.extend(inputs.iter().map(|p| escape_path(p.as_ref())));

        if !implicit.is_empty() {
            words.push("|".to_string());
            words.extend(implicit.iter().map(|p| escape_path(p.as_ref())));
        }

        self.wrapped(0, &words);

        for (key, value) in variables {
            self.binding(1, key, value);
        }
        self
    }

    /// Returns the text written so far
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Consumes the writer and returns the complete text
    pub fn finish(self) -> String {
        self.buffer
    }

    fn binding(&mut self, indent: usize, key: &str, value: &str) -> &mut Self {
        let words = vec![format!("{} =", key), value.to_string()];
        self.wrapped(indent, &words);
        self
    }

    /// Writes words separated by spaces, breaking long lines with `$`
    fn wrapped(&mut self, indent: usize, words: &[String]) {
        let leading = "  ".repeat(indent);
        let mut line = leading.clone();
        let mut first = true;

        for word in words {
            if !first && line.len() + 1 + word.len() > LINE_WIDTH {
                let _ = writeln!(self.buffer, "{} $", line);
                line = format!("{}    {}", leading, word);
                continue;
            }
            if !first {
                line.push(' ');
            }
            line.push_str(word);
            first = false;
        }

        let _ = writeln!(self.buffer, "{}", line);
    }
}
