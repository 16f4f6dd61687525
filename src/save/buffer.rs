use tracing::debug;

const INITIAL_SIZE: usize = 4096;

/// Circular character buffer the text saver renders into.
///
/// Text is appended at `input` and consumed at `output`. Escaping happens in
/// place once a piece of text is in the buffer: [`EmitBuffer::replace`]
/// swaps a single character for a longer sequence, shifting whichever side
/// of the ring holds the affected characters. The buffer never fills up
/// completely, so `input == output` always means empty.
#[derive(Debug, Default)]
pub(crate) struct EmitBuffer {
    buf: Vec<char>,
    input: usize,
    output: usize,
    free: usize,
    last_emit_in: usize,
    last_emit_len: usize,
}

impl EmitBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of characters ready to be read.
    pub(crate) fn available(&self) -> usize {
        self.buf.len() - self.free
    }

    /// Start and length of the most recent emit.
    pub(crate) fn last_emit(&self) -> (usize, usize) {
        (self.last_emit_in, self.last_emit_len)
    }

    pub(crate) fn get(&self, i: usize) -> char {
        self.buf[i]
    }

    /// The index following `i`, wrapping around the ring.
    pub(crate) fn step(&self, i: usize) -> usize {
        let next = i + 1;
        if next == self.buf.len() {
            0
        } else {
            next
        }
    }

    /// The most recently emitted character still in the buffer.
    pub(crate) fn last(&self) -> Option<char> {
        if self.available() == 0 {
            return None;
        }
        let n = self.buf.len();
        Some(self.buf[(self.input + n - 1) % n])
    }

    pub(crate) fn emit_char(&mut self, c: char) {
        if self.pre_emit(1) {
            return;
        }
        self.buf[self.input] = c;
        self.input = self.step(self.input);
    }

    pub(crate) fn emit(&mut self, s: &str) {
        if self.pre_emit(s.chars().count()) {
            return;
        }
        for c in s.chars() {
            self.buf[self.input] = c;
            self.input = self.step(self.input);
        }
    }

    pub(crate) fn emit_chars(&mut self, src: &[char]) {
        let cch = src.len();
        if self.pre_emit(cch) {
            return;
        }
        let n = self.buf.len();
        let chunk = n - self.input;
        if cch < chunk {
            self.buf[self.input..self.input + cch].copy_from_slice(src);
        } else {
            self.buf[self.input..].copy_from_slice(&src[..chunk]);
            self.buf[..cch - chunk].copy_from_slice(&src[chunk..]);
        }
        self.input = (self.input + cch) % n;
    }

    /// Reserve room for `cch` characters. Returns `true` when there is
    /// nothing to write.
    fn pre_emit(&mut self, cch: usize) -> bool {
        self.last_emit_len = cch;
        if cch == 0 {
            return true;
        }
        if self.free <= cch {
            self.resize(cch, 0);
        }
        if self.available() == 0 {
            self.input = 0;
            self.output = 0;
        }
        self.last_emit_in = self.input;
        self.free -= cch;
        false
    }

    /// Grow the ring so that more than `cch` characters are free, and
    /// linearize its content. Returns where the character at `index` ended
    /// up.
    fn resize(&mut self, cch: usize, index: usize) -> usize {
        let old_len = self.buf.len();
        let used = self.available();
        let mut new_len = if old_len == 0 {
            INITIAL_SIZE
        } else {
            old_len * 2
        };
        while new_len - used <= cch {
            new_len *= 2;
        }
        debug!(from = old_len, to = new_len, "growing emit buffer");
        let mut new_buf = vec!['\0'; new_len];
        let mut index = index;
        if used > 0 {
            if self.input > self.output {
                new_buf[..used].copy_from_slice(&self.buf[self.output..self.input]);
                index -= self.output;
            } else {
                let tail = old_len - self.output;
                new_buf[..tail].copy_from_slice(&self.buf[self.output..]);
                new_buf[tail..used].copy_from_slice(&self.buf[..self.input]);
                index = if index >= self.output {
                    index - self.output
                } else {
                    index + tail
                };
            }
            self.output = 0;
            self.input = used;
            self.free += new_len - old_len;
        } else {
            self.input = 0;
            self.output = 0;
            self.free = new_len;
            index = 0;
        }
        self.buf = new_buf;
        index
    }

    /// Replace the character at `i` with `seq`, returning the index just
    /// past the inserted sequence.
    pub(crate) fn replace(&mut self, i: usize, seq: &str) -> usize {
        let len = seq.chars().count();
        debug_assert!(len > 0);
        let d = len - 1;
        if d == 0 {
            if let Some(c) = seq.chars().next() {
                self.buf[i] = c;
            }
            return self.step(i);
        }
        let mut i = i;
        if d >= self.free {
            i = self.resize(d, i);
        }
        let n = self.buf.len();
        if self.output > self.input && i >= self.output {
            // wrapped and `i` is in the tail segment: move the tail start left
            self.buf.copy_within(self.output..i, self.output - d);
            self.output -= d;
            i -= d;
        } else {
            let count = self.input - i - 1;
            for k in (0..count).rev() {
                let from = i + 1 + k;
                self.buf[(from + d) % n] = self.buf[from];
            }
            self.input = (self.input + d) % n;
        }
        for (k, c) in seq.chars().enumerate() {
            self.buf[(i + k) % n] = c;
        }
        self.free -= d;
        (i + d + 1) % n
    }

    /// Move up to `dst.len()` characters out of the buffer.
    pub(crate) fn read(&mut self, dst: &mut [char]) -> usize {
        let len = dst.len().min(self.available());
        if len == 0 {
            return 0;
        }
        let n = self.buf.len();
        let chunk = n - self.output;
        if chunk >= len {
            dst[..len].copy_from_slice(&self.buf[self.output..self.output + len]);
        } else {
            dst[..chunk].copy_from_slice(&self.buf[self.output..]);
            dst[chunk..len].copy_from_slice(&self.buf[..len - chunk]);
        }
        self.output = (self.output + len) % n;
        self.free += len;
        len
    }

    /// Move everything buffered onto the end of `out`.
    pub(crate) fn drain_into(&mut self, out: &mut String) {
        let n = self.buf.len();
        let len = self.available();
        out.reserve(len);
        for k in 0..len {
            out.push(self.buf[(self.output + k) % n]);
        }
        self.output = self.input;
        self.free = n;
    }
}
