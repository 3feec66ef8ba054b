//! Call-stack capture and lazy symbol resolution.
//!
//! Capturing only records raw instruction pointers, which is cheap enough to
//! do for every error. Symbols are resolved when frames are requested.

use std::ffi::c_void;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Maximum number of frames recorded per capture.
pub const MAX_DEPTH: usize = 32;

const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Frames whose function path contains one of these belong to the capture
/// machinery, not to the caller.
const INTERNAL_PATHS: &[&str] = &[
    "backtrace::",
    "faultline_core::stack::",
    "faultline_core::error::DecoratedError::",
    "faultline_core::error::DecoratedError>::",
];

/// A single resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Demangled function path.
    pub function: String,
    /// Source file path, empty when debug info is unavailable.
    pub file: String,
    pub line: u32,
    /// Instruction pointer of this frame.
    pub pc: usize,
}

impl StackFrame {
    fn unresolved(pc: usize) -> Self {
        Self {
            function: UNKNOWN_FUNCTION.to_string(),
            file: String::new(),
            line: 0,
            pc,
        }
    }

    fn is_internal(&self) -> bool {
        INTERNAL_PATHS.iter().any(|p| self.function.contains(p))
    }
}

/// `file:line - function`, or just the function when the location is unknown.
impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            f.write_str(&self.function)
        } else {
            write!(f, "{}:{} - {}", self.file, self.line, self.function)
        }
    }
}

/// An unresolved call stack. Cloning shares the capture.
#[derive(Debug, Clone)]
pub struct StackTrace {
    ips: Arc<[usize]>,
}

impl StackTrace {
    /// Record the current thread's call stack.
    #[inline(never)]
    pub fn capture() -> Self {
        let mut ips = Vec::with_capacity(MAX_DEPTH);
        backtrace::trace(|frame| {
            ips.push(frame.ip() as usize);
            ips.len() < MAX_DEPTH
        });
        Self { ips: ips.into() }
    }

    /// Number of raw frames recorded (before filtering).
    pub fn depth(&self) -> usize {
        self.ips.len()
    }

    /// Returns `true` if both traces share the same capture.
    pub fn ptr_eq(&self, other: &StackTrace) -> bool {
        Arc::ptr_eq(&self.ips, &other.ips)
    }

    /// Resolve symbols, dropping frames of the capture machinery.
    pub fn frames(&self) -> Vec<StackFrame> {
        self.ips
            .iter()
            .map(|&ip| resolve_frame(ip))
            .filter(|frame| !frame.is_internal())
            .collect()
    }

    pub fn iter(&self) -> StackIterator {
        StackIterator::new(self.frames())
    }

    /// One line per frame, formatted as [`StackFrame`]'s `Display`.
    pub fn render(&self) -> String {
        render_frames(&self.frames())
    }
}

fn render_frames(frames: &[StackFrame]) -> String {
    let mut out = String::new();
    for frame in frames {
        let _ = writeln!(out, "{frame}");
    }
    out
}

fn resolve_frame(ip: usize) -> StackFrame {
    let mut resolved: Option<StackFrame> = None;
    // Inlined frames report several symbols for one address; keep the first.
    backtrace::resolve(ip as *mut c_void, |symbol| {
        if resolved.is_some() {
            return;
        }
        resolved = Some(StackFrame {
            function: symbol
                .name()
                .map(|name| format!("{name:#}"))
                .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string()),
            file: symbol
                .filename()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            line: symbol.lineno().unwrap_or(0),
            pc: ip,
        });
    });
    resolved.unwrap_or_else(|| StackFrame::unresolved(ip))
}

// ─── Iterator ─────────────────────────────────────────────────────────────────

/// Cursor over resolved frames that can be rewound.
#[derive(Debug, Clone)]
pub struct StackIterator {
    frames: Vec<StackFrame>,
    index: usize,
}

impl StackIterator {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames, index: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.index < self.frames.len()
    }

    /// Rewind to the first frame.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Frames not yet visited.
    pub fn remaining(&self) -> &[StackFrame] {
        &self.frames[self.index.min(self.frames.len())..]
    }

    /// Every frame, regardless of the cursor.
    pub fn all_frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

impl Iterator for StackIterator {
    type Item = StackFrame;

    fn next(&mut self) -> Option<StackFrame> {
        let frame = self.frames.get(self.index).cloned()?;
        self.index += 1;
        Some(frame)
    }
}
