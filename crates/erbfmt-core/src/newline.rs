//! Final-newline normalization of formatter output
//!
//! The formatter decides the body of the document; this module decides how
//! it ends. Either a final newline is guaranteed, or the output ends exactly
//! the way the input did.

use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Configured end-of-line style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndOfLine {
    #[serde(rename = "\n", alias = "lf", alias = "LF")]
    Lf,
    #[serde(rename = "\r\n", alias = "crlf", alias = "CRLF")]
    CrLf,
    /// `\r\n` on native Windows, `\n` elsewhere
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl EndOfLine {
    pub fn as_str(self, platform: Platform) -> &'static str {
        match self {
            EndOfLine::Lf => "\n",
            EndOfLine::CrLf => "\r\n",
            EndOfLine::Auto => platform.native_newline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NewlinePolicy {
    pub insert_final_newline: bool,
    pub eol: EndOfLine,
}

/// The trailing newline of `text`: `"\r\n"`, `"\n"` or `""`
pub fn trailing_newline(text: &str) -> &'static str {
    // \r\n has to be checked before \n
    if text.ends_with("\r\n") {
        "\r\n"
    } else if text.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Apply the final-newline policy to `output`, given the `input` it came from
pub fn apply(input: &str, output: String, policy: NewlinePolicy, platform: Platform) -> String {
    if policy.insert_final_newline {
        let mut output = output;
        if trailing_newline(&output).is_empty() {
            push_newline(&mut output, policy.eol.as_str(platform));
        }
        return output;
    }

    let wanted = trailing_newline(input);
    let found = trailing_newline(&output);
    if wanted == found {
        return output;
    }

    let mut output = output;
    output.truncate(output.len() - found.len());
    if !wanted.is_empty() {
        push_newline(&mut output, wanted);
    }
    output
}

/// Append `newline`, absorbing a lone trailing `\r` so it cannot turn `\n` into `\r\n`
fn push_newline(output: &mut String, newline: &str) {
    if output.ends_with('\r') {
        output.pop();
    }
    output.push_str(newline);
}
