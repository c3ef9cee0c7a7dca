//! Wikitext sanitizer: strips encyclopedia markup down to near-plain text.
//!
//! The rewrite is a fixed sequence of regex passes. Order matters: each pass
//! assumes markup handled by earlier passes is gone and markup handled by
//! later passes is still present.

use crate::error::Result;
use regex::Regex;
use std::borrow::Cow;

/// Upper bound on template-removal passes.
///
/// Each pass removes the innermost `{{...}}` layer, so templates nested more
/// than this deep leave residue in the output.
pub const TEMPLATE_PASSES: usize = 10;

/// Precompiled pattern set. Built once, shared read-only for a whole run.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    comment: Regex,
    reference: Regex,
    template: Regex,
    table_row: Regex,
    orphan_brace: Regex,
    orphan_bracket: Regex,
    file: Regex,
    category: Regex,
    external_link: Regex,
    caption_line: Regex,
    internal_link: Regex,
    tag: Regex,
    emphasis: Regex,
    header: Regex,
    spaces: Regex,
    newlines: Regex,
}

impl Sanitizer {
    /// Compile the pattern set.
    pub fn new() -> Result<Self> {
        Ok(Self {
            comment: Regex::new(r"(?s)<!--.*?-->")?,
            reference: Regex::new(r"(?s)<ref[^>]*>.*?</ref>|<ref[^/]*/>")?,
            template: Regex::new(r"\{\{[^{}]*\}\}")?,
            table_row: Regex::new(r"(?m)^[^\S\n]*[|!].*$")?,
            orphan_brace: Regex::new(r"(?m)^\{\{[A-Za-z][^{}\n]*$")?,
            orphan_bracket: Regex::new(r"(?m)^[^\[\]\n]*\]\]$")?,
            file: Regex::new(r"(?i)\[\[(File|Image):[^\n]*\]\]")?,
            category: Regex::new(r"(?i)\[\[Category:[^\]]*\]\]")?,
            external_link: Regex::new(r"\[https?://[^\]]*\]")?,
            caption_line: Regex::new(r"(?im)^(thumb|thumbnail|right|left|center|\d+px)[|].*$")?,
            internal_link: Regex::new(r"\[\[(?:[^|\]]*\|)?([^\]]*)\]\]")?,
            tag: Regex::new(r"<[^>]+>")?,
            emphasis: Regex::new(r"'{2,}")?,
            header: Regex::new(r"={2,}\s*([^=]+?)\s*={2,}")?,
            spaces: Regex::new(r"[ \t]{2,}")?,
            newlines: Regex::new(r"\n{3,}")?,
        })
    }

    /// Rewrite raw markup to plain text.
    pub fn sanitize(&self, markup: &str) -> String {
        let mut s = replace(&self.comment, markup.to_string(), "");
        s = replace(&self.reference, s, "");

        for _ in 0..TEMPLATE_PASSES {
            match replace_any(&self.template, &s, "") {
                Some(next) => s = next,
                None => break,
            }
        }

        s = replace(&self.table_row, s, "");
        s = replace(&self.orphan_brace, s, "");
        s = replace(&self.orphan_bracket, s, "");
        s = replace(&self.file, s, "");
        s = replace(&self.category, s, "");
        s = replace(&self.external_link, s, "");
        s = replace(&self.caption_line, s, "");
        s = replace(&self.internal_link, s, "$1");
        s = replace(&self.tag, s, "");
        s = replace(&self.emphasis, s, "");
        s = replace(&self.header, s, "\n${1}\n");
        s = replace(&self.spaces, s, " ");
        s = replace(&self.newlines, s, "\n\n");
        s.trim().to_string()
    }
}

/// Replace every match, reusing `text` when nothing matched.
fn replace(re: &Regex, text: String, rep: &str) -> String {
    let replaced = replace_any(re, &text, rep);
    replaced.unwrap_or(text)
}

/// `Some(rewritten)` if at least one match was replaced.
fn replace_any(re: &Regex, text: &str, rep: &str) -> Option<String> {
    match re.replace_all(text, rep) {
        Cow::Owned(out) => Some(out),
        Cow::Borrowed(_) => None,
    }
}
