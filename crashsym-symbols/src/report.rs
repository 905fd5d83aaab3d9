//! Parsing of Apple-style textual crash reports.
//!
//! The parser is line oriented and total: every line of the input is kept, in
//! order, either as a recognized stack frame or as a verbatim context line, so
//! that symbolicated output stays diffable against the input. The only way
//! parsing can fail is if the report contains no `Binary Images:` entry with a
//! UUID, because then there is nothing to match debug symbols against.

use memchr::memmem;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, hex_digit1, space0, space1};
use nom::combinator::map_res;
use nom::sequence::{preceded, tuple};
use nom::IResult;
use uuid::Uuid;

use crate::error::Error;

/// One binary image from the `Binary Images:` section of a crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    pub name: String,
    pub uuid: Uuid,
    pub arch: String,
    pub load_address: u64,
    pub end_address: u64,
    pub path: String,
}

impl BinaryImage {
    /// Whether `address` falls into this image's mapped range.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.load_address && address <= self.end_address
    }
}

/// One stack frame line from a thread backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The thread this frame belongs to. `None` for frames under headers
    /// without a thread number, e.g. `Last Exception Backtrace:`.
    pub thread: Option<u32>,
    pub index: u32,
    pub image_name: String,
    /// The absolute address, as printed in the crash report.
    pub address: u64,
    /// A pre-existing symbol hint from the input, e.g. `__pthread_kill` in
    /// `... 0x1c2b5e0ac __pthread_kill + 8`. `None` when the input carried a
    /// `loadaddress + offset` expression instead.
    pub symbol_hint: Option<String>,
    /// The original line text up to (and including) the whitespace after the
    /// address token. The symbolicated rendition is appended to this.
    pub(crate) line_prefix: String,
}

/// A line of the report, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// Preserved verbatim.
    Context(String),
    /// A recognized stack frame whose tail gets substituted on symbolication.
    Frame(Frame),
}

/// Immutable parsed representation of a crash report.
#[derive(Debug, Clone)]
pub struct CrashReport {
    process_name: Option<String>,
    lines: Vec<ReportLine>,
    images: Vec<BinaryImage>,
    ends_with_newline: bool,
}

impl CrashReport {
    /// Parse a crash report from text.
    ///
    /// Returns [`Error::NoUuid`] if no binary image with a UUID was found;
    /// any other input parses successfully, with unrecognized lines preserved
    /// as context.
    pub fn parse(text: &str) -> Result<CrashReport, Error> {
        let mut process_name = None;
        let mut lines = Vec::new();
        let mut images = Vec::new();

        let mut current_thread: Option<u32> = None;
        let mut in_binary_images = false;

        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("Process:") {
                if process_name.is_none() {
                    process_name = Some(strip_pid_suffix(rest.trim()).to_string());
                }
                lines.push(ReportLine::Context(line.to_string()));
                continue;
            }

            if line.starts_with("Binary Images:") {
                in_binary_images = true;
                lines.push(ReportLine::Context(line.to_string()));
                continue;
            }

            if in_binary_images {
                if let Some(image) = parse_image_line(line) {
                    images.push(image);
                }
                // Image lines pass through verbatim either way; only frame
                // lines are rewritten.
                lines.push(ReportLine::Context(line.to_string()));
                continue;
            }

            if let Some(thread) = parse_thread_header(line) {
                current_thread = thread;
                lines.push(ReportLine::Context(line.to_string()));
                continue;
            }

            if let Some(frame) = parse_frame_line(line, current_thread) {
                lines.push(ReportLine::Frame(frame));
                continue;
            }

            lines.push(ReportLine::Context(line.to_string()));
        }

        if images.is_empty() {
            return Err(Error::NoUuid);
        }

        Ok(CrashReport {
            process_name,
            lines,
            images,
            ends_with_newline: text.ends_with('\n'),
        })
    }

    pub fn process_name(&self) -> Option<&str> {
        self.process_name.as_deref()
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn images(&self) -> &[BinaryImage] {
        &self.images
    }

    /// The first image of the `Binary Images:` section. This is the crashed
    /// process's own binary, and the one whose dSYM is searched for.
    pub fn primary_image(&self) -> &BinaryImage {
        &self.images[0]
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.lines.iter().filter_map(|line| match line {
            ReportLine::Frame(frame) => Some(frame),
            ReportLine::Context(_) => None,
        })
    }

    /// Resolve a frame's image reference against the report's image records,
    /// by name first and by address range as a fallback.
    pub fn image_for_frame(&self, frame: &Frame) -> Option<&BinaryImage> {
        self.images
            .iter()
            .find(|image| image.name == frame.image_name)
            .or_else(|| self.images.iter().find(|image| image.contains(frame.address)))
    }

    pub(crate) fn ends_with_newline(&self) -> bool {
        self.ends_with_newline
    }
}

/// `MyApp [1234]` -> `MyApp`
fn strip_pid_suffix(value: &str) -> &str {
    match value.rfind(" [") {
        Some(pos) if value.ends_with(']') => &value[..pos],
        _ => value,
    }
}

fn hex_u64(input: &str) -> IResult<&str, u64> {
    map_res(preceded(tag("0x"), hex_digit1), |s: &str| {
        u64::from_str_radix(s, 16)
    })(input)
}

fn dec_u32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(input)
}

/// Recognizes `Thread N:`, `Thread N Crashed:`, `Thread N name: ...` and
/// `Last Exception Backtrace:`. Returns the thread number for the frames that
/// follow (`Some(None)` meaning "frames follow, but without a number").
fn parse_thread_header(line: &str) -> Option<Option<u32>> {
    if line.starts_with("Last Exception Backtrace:") {
        return Some(None);
    }
    let rest = line.strip_prefix("Thread ")?;
    let (rest, thread) = dec_u32(rest).ok()?;
    if rest.starts_with(':') || rest.starts_with(" Crashed:") || rest.starts_with(" name:") {
        Some(Some(thread))
    } else {
        None
    }
}

/// Parses one backtrace frame line:
///
/// ```text
/// 2   XYZLib    0x0000000034648e88 0x83000 + 8740
/// 5   libsystem_kernel.dylib    0x00000001c2b5e0ac __pthread_kill + 8
/// ```
///
/// The image name column may contain spaces, so the line is split at the
/// first ` 0x` occurrence rather than on whitespace alone.
fn parse_frame_line(line: &str, thread: Option<u32>) -> Option<Frame> {
    let addr_pos = memmem::find(line.as_bytes(), b" 0x")?;
    let (head, tail) = line.split_at(addr_pos);

    let (head_rest, (_, index, _)) = tuple((space0, dec_u32, space1))(head).ok()?;
    let image_name = head_rest.trim();
    if image_name.is_empty() {
        return None;
    }

    let tail_trimmed = tail.trim_start();
    let (after_address, address) = hex_u64(tail_trimmed).ok()?;
    let rest = after_address.trim_start();
    if rest.is_empty() {
        return None;
    }

    let prefix_len = line.len() - rest.len();
    let symbol_hint = if rest.starts_with("0x") {
        None
    } else {
        match memmem::rfind(rest.as_bytes(), b" + ") {
            Some(pos) => Some(rest[..pos].to_string()),
            None => Some(rest.to_string()),
        }
    };

    Some(Frame {
        thread,
        index,
        image_name: image_name.to_string(),
        address,
        symbol_hint,
        line_prefix: line[..prefix_len].to_string(),
    })
}

/// Parses one `Binary Images:` entry:
///
/// ```text
/// 0x102194000 - 0x1021a3fff +MyApp arm64  <8a5e7bf7a6194d7aa85f0a32f8f9ef3c> /path/to/MyApp
/// ```
///
/// The leading `+` marks the user binary and is not part of the name.
fn parse_image_line(line: &str) -> Option<BinaryImage> {
    let (rest, (_, load_address, _, _, _, end_address, _)) = tuple((
        space0,
        hex_u64,
        space1,
        char('-'),
        space1,
        hex_u64,
        space1,
    ))(line)
    .ok()?;

    let uuid_open = memchr::memchr(b'<', rest.as_bytes())?;
    let uuid_close = memchr::memchr(b'>', rest.as_bytes())?;
    if uuid_close <= uuid_open {
        return None;
    }

    let uuid = Uuid::parse_str(rest[uuid_open + 1..uuid_close].trim()).ok()?;

    let name_and_arch = rest[..uuid_open].trim();
    let mut tokens = name_and_arch.split_whitespace().collect::<Vec<&str>>();
    if tokens.len() < 2 {
        return None;
    }
    let arch = tokens.pop()?.to_string();
    let name = tokens.join(" ");
    let name = name.strip_prefix('+').unwrap_or(&name).to_string();
    if name.is_empty() {
        return None;
    }

    let path = rest[uuid_close + 1..].trim().to_string();

    Some(BinaryImage {
        name,
        uuid,
        arch,
        load_address,
        end_address,
        path,
    })
}
