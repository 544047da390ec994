use num_format::{Locale, ToFormattedString};

use crate::percentage;

/// Text builder for the table rendering of the report: aligned labels, thousands-grouped
/// numbers and percentages
pub struct ReportWriter {
    pub output: String,
    pub identation: String,
    pub label_width: usize,
    pub label_width_stack: Vec<usize>,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            identation: String::new(),
            label_width: 24,
            label_width_stack: Vec::new(),
        }
    }

    pub fn set_identation(&mut self, level: usize) {
        self.identation = " ".repeat(level * 4);
    }
    pub fn set_and_push_label_width(&mut self, width: usize) {
        self.label_width_stack.push(self.label_width);
        self.label_width = width;
    }
    pub fn pop_label_width(&mut self) {
        if let Some(width) = self.label_width_stack.pop() {
            self.label_width = width;
        }
    }

    pub fn add(&mut self, text: &str) {
        self.output += text;
    }

    pub fn title(&mut self, label: &str) {
        self.output += &format!(
            "\n{identation}{label}\n{identation}{}\n",
            "-".repeat(label.len()),
            identation = self.identation
        );
    }

    pub fn title_count_perc(&mut self, label: &str, count_label: &str) {
        self.title(&format!(
            "{label:<label_width$} {count_label:>15}       %",
            label_width = self.label_width
        ));
    }

    pub fn add_count(&mut self, label: &str, count: u64) {
        self.output += &format!(
            "{}{label:<label_width$} {:>15}\n",
            self.identation,
            count.to_formatted_string(&Locale::en),
            label_width = self.label_width
        );
    }

    /// Adds a line with a count and its share of `total`; a zero total gives 0.00%
    pub fn add_perc(&mut self, label: &str, count: u64, total: u64) {
        self.output += &format!(
            "{}{label:<label_width$} {:>15} {:6.2}%\n",
            self.identation,
            count.to_formatted_string(&Locale::en),
            percentage(count, total),
            label_width = self.label_width,
        );
    }

    pub fn add_separator(&mut self) {
        self.output += &format!("{}{}\n", self.identation, "-".repeat(self.label_width + 24));
    }
}
