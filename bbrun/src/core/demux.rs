//! Output demultiplexing: per-command output and exit status from one raw
//! stream.
//!
//! Buffered capture is fed as a single chunk, streamed capture chunk by chunk;
//! both go through the same [`Demultiplexer`], so line reconstruction and
//! segmentation are independent of how the bytes arrived.

use crate::core::tokens::Tokens;
use crate::core::types::{CommandOutput, ExecutionResult, StatusSource};

/// Reassembles complete lines from arbitrarily split byte chunks.
///
/// Bytes are decoded only once a line is complete, so a multi-byte character
/// split across two chunks decodes the same as if it arrived whole.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(decode_line(&self.pending));
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        lines
    }

    /// Flush the trailing partial line, if it holds anything but whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let line = decode_line(&self.pending);
        self.pending.clear();
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Incremental demultiplexer for one step's output.
#[derive(Debug)]
pub struct Demultiplexer<'a> {
    tokens: &'a Tokens,
    assembler: LineAssembler,
    preamble: Vec<String>,
    segments: Vec<Vec<String>>,
    ended_with_sentinel: bool,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(tokens: &'a Tokens) -> Self {
        Self {
            tokens,
            assembler: LineAssembler::new(),
            preamble: Vec::new(),
            segments: Vec::new(),
            ended_with_sentinel: false,
        }
    }

    /// Consume one chunk, forwarding every non-marker line to `echo`.
    pub fn feed(&mut self, chunk: &[u8], echo: &mut dyn FnMut(&str)) {
        for line in self.assembler.push(chunk) {
            self.accept(line, echo);
        }
    }

    /// Flush the final partial line and pair segments with `commands`.
    pub fn finish(
        mut self,
        commands: &[String],
        status: StatusSource,
        echo: &mut dyn FnMut(&str),
    ) -> ExecutionResult {
        if let Some(line) = self.assembler.finish() {
            self.accept(line, echo);
        }

        let exit_code = match status {
            StatusSource::Reported(code) => code,
            StatusSource::Sentinel if self.ended_with_sentinel => 0,
            StatusSource::Sentinel => 1,
        };

        let commands = commands
            .iter()
            .zip(self.segments)
            .map(|(command, lines)| CommandOutput {
                command: command.clone(),
                lines,
            })
            .collect();

        ExecutionResult {
            exit_code,
            commands,
            preamble: self.preamble,
            fault: None,
        }
    }

    fn accept(&mut self, line: String, echo: &mut dyn FnMut(&str)) {
        if let Some(prefix) = line.strip_suffix(self.tokens.frame.as_str()) {
            // Output without a trailing newline shares the marker's line.
            self.push_output(prefix, echo);
            self.segments.push(Vec::new());
            self.ended_with_sentinel = false;
        } else if let Some(prefix) = line.strip_suffix(self.tokens.sentinel.as_str()) {
            self.push_output(prefix, echo);
            self.ended_with_sentinel = true;
        } else {
            echo(&line);
            self.current_segment().push(line);
            self.ended_with_sentinel = false;
        }
    }

    fn push_output(&mut self, text: &str, echo: &mut dyn FnMut(&str)) {
        if text.is_empty() {
            return;
        }
        echo(text);
        self.current_segment().push(text.to_string());
    }

    /// Segment of the running command; lines before the first frame go to
    /// the preamble.
    fn current_segment(&mut self) -> &mut Vec<String> {
        match self.segments.last_mut() {
            Some(segment) => segment,
            None => &mut self.preamble,
        }
    }
}

/// Demultiplex a fully buffered capture.
pub fn demultiplex_buffered(
    output: &[u8],
    commands: &[String],
    tokens: &Tokens,
    exit_code: i32,
) -> ExecutionResult {
    let mut demux = Demultiplexer::new(tokens);
    let mut echo = |_: &str| {};
    demux.feed(output, &mut echo);
    demux.finish(commands, StatusSource::Reported(exit_code), &mut echo)
}
