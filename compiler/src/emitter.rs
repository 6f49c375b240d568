/// Output buffer with indentation management for generated C text.
#[derive(Debug, Default)]
pub struct CEmitter {
    output:       String,
    indent_level: usize,
}

impl CEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an indented line with trailing newline.
    pub fn line(&mut self, line: &str) {
        for _ in 0..self.indent_level {
            self.output.push_str("    ");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Append each line of a pre-formatted block verbatim.
    pub fn raw_lines(&mut self, lines: &[&str]) {
        for line in lines {
            self.output.push_str(line);
            self.output.push('\n');
        }
    }

    pub fn blank_line(&mut self) {
        self.output.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Emit `open`, run `body` one level deeper, then emit `close`.
    pub fn block<F: FnOnce(&mut Self)>(&mut self, open: &str, close: &str, body: F) {
        self.line(open);
        self.indent();
        body(self);
        self.dedent();
        self.line(close);
    }

    /// Emit a function definition with the opening brace on its own line.
    pub fn function<F: FnOnce(&mut Self)>(&mut self, signature: &str, body: F) {
        self.line(signature);
        self.block("{", "}", body);
    }

    /// Emit `items` as lines separated by commas, the last one without.
    pub fn comma_separated<I: IntoIterator<Item = String>>(&mut self, items: I) {
        let items: Vec<String> = items.into_iter().collect();
        let last = items.len().saturating_sub(1);
        for (i, item) in items.iter().enumerate() {
            if i == last {
                self.line(item);
            } else {
                self.line(&format!("{},", item));
            }
        }
    }

    /// Consume and return the generated output.
    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_with_indent() {
        let mut e = CEmitter::new();
        e.line("int x = 5;");
        e.indent();
        e.line("x++;");
        e.dedent();
        e.line("return x;");
        assert_eq!(e.finish(), "int x = 5;\n    x++;\nreturn x;\n");
    }

    #[test]
    fn dedent_saturates() {
        let mut e = CEmitter::new();
        e.dedent();
        e.line("a");
        assert_eq!(e.finish(), "a\n");
    }

    #[test]
    fn block_nests_body() {
        let mut e = CEmitter::new();
        e.block("if (x) {", "}", |e| {
            e.block("while (y) {", "}", |e| e.line("y--;"));
        });
        assert_eq!(e.finish(), "if (x) {\n    while (y) {\n        y--;\n    }\n}\n");
    }

    #[test]
    fn function_brace_on_own_line() {
        let mut e = CEmitter::new();
        e.function("int f(void)", |e| e.line("return 0;"));
        assert_eq!(e.finish(), "int f(void)\n{\n    return 0;\n}\n");
    }

    #[test]
    fn comma_separated_skips_last_comma() {
        let mut e = CEmitter::new();
        e.block("enum {", "};", |e| {
            e.comma_separated(vec!["A".to_string(), "B".to_string(), "__MAX".to_string()]);
        });
        assert_eq!(e.finish(), "enum {\n    A,\n    B,\n    __MAX\n};\n");
    }

    #[test]
    fn raw_lines_ignore_indent() {
        let mut e = CEmitter::new();
        e.indent();
        e.raw_lines(&["#define A \\", "    1"]);
        assert_eq!(e.finish(), "#define A \\\n    1\n");
    }
}
