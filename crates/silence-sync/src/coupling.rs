//! Textual cross-references between silences and tickets.
//!
//! A silence comment or ticket description is "coupled" when its very first
//! line is a marker of the form `<lead><prefix>: <reference>`. Matching is a
//! literal compare from position zero: a marker anywhere else in the text is
//! ignored.
//!
//! ```
//! use silence_sync::coupling::CouplingMarker;
//!
//! let marker = CouplingMarker::silence_comment("silence-manager");
//! let comment = marker.embed("Disk pressure on db-1", "OPS-42");
//! assert_eq!(comment, "# silence-manager: OPS-42\nDisk pressure on db-1");
//! assert_eq!(marker.extract(&comment), Some("OPS-42"));
//! ```

/// Default prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "silence-manager";

/// Marker convention for one free-text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouplingMarker {
    /// Text placed before the prefix (e.g. `"# "` in silence comments).
    lead: &'static str,
    /// Marker prefix, shared by both sides of the coupling.
    prefix: String,
    /// Text placed between the marker line and the original text.
    separator: &'static str,
}

impl CouplingMarker {
    /// Create a marker with an explicit lead and separator.
    ///
    /// An empty prefix falls back to [`DEFAULT_PREFIX`].
    #[must_use]
    pub fn new(lead: &'static str, prefix: impl Into<String>, separator: &'static str) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            prefix
        };
        Self {
            lead,
            prefix,
            separator,
        }
    }

    /// Marker used in silence comments: `# prefix: TICKET-1\n<comment>`.
    #[must_use]
    pub fn silence_comment(prefix: impl Into<String>) -> Self {
        Self::new("# ", prefix, "\n")
    }

    /// Marker used in ticket descriptions: `prefix: <silence-id>\n\n<description>`.
    #[must_use]
    pub fn ticket_description(prefix: impl Into<String>) -> Self {
        Self::new("", prefix, "\n\n")
    }

    /// The configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The literal text a coupled field must start with.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("{}{}: ", self.lead, self.prefix)
    }

    /// Prepend a marker line carrying `reference` to `text`.
    ///
    /// An empty reference leaves the text untouched.
    #[must_use]
    pub fn embed(&self, text: &str, reference: &str) -> String {
        if reference.is_empty() {
            return text.to_string();
        }
        format!("{}{reference}{}{text}", self.marker(), self.separator)
    }

    /// Recover the reference from a coupled field.
    ///
    /// Returns the text between the marker and the first `\n` (or the end of
    /// the string). Returns `None` when the field does not start with the
    /// exact marker or the reference is empty.
    #[must_use]
    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let rest = text.strip_prefix(self.marker().as_str())?;
        let reference = rest.split('\n').next().unwrap_or_default();
        if reference.is_empty() {
            None
        } else {
            Some(reference)
        }
    }

    /// Split a field into its reference and the text that followed the marker line.
    ///
    /// Uncoupled fields come back unchanged with no reference.
    #[must_use]
    pub fn split<'a>(&self, text: &'a str) -> (Option<&'a str>, &'a str) {
        let Some(reference) = self.extract(text) else {
            return (None, text);
        };
        let rest = &text[self.marker().len() + reference.len()..];
        let rest = rest
            .strip_prefix(self.separator)
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
        (Some(reference), rest)
    }
}
