//! Extraction of the command trigger from chat text.

/// Words that suppress command handling when they appear in a message.
///
/// Messages talking *about* commands ("type !join to play") must not run
/// them.
const RESERVED_WORDS: [&str; 3] = ["command", "use", "type"];

/// A trigger found in a message, with the text that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'t> {
    /// Lower-cased trigger without the `!`.
    pub trigger: String,
    /// Everything after the trigger token.
    pub rest: &'t str,
}

impl<'t> Invocation<'t> {
    /// Whitespace-separated arguments after the trigger.
    pub fn args(&self) -> impl Iterator<Item = &'t str> {
        self.rest.split_whitespace()
    }

    /// The first argument, if any.
    pub fn first_arg(&self) -> Option<&'t str> {
        self.args().next()
    }
}

/// Finds the first `!` followed by ASCII word characters or dots.
///
/// # Examples
///
/// ```
/// use en_passant::commands::parse_invocation;
///
/// let inv = parse_invocation("hey !Join magnus").unwrap();
/// assert_eq!(inv.trigger, "join");
/// assert_eq!(inv.first_arg(), Some("magnus"));
///
/// assert!(parse_invocation("no trigger here!").is_none());
/// ```
pub fn parse_invocation(text: &str) -> Option<Invocation<'_>> {
    let mut search_pos = 0;
    while let Some(offset) = text[search_pos..].find('!') {
        let bang = search_pos + offset;
        let after = &text[bang + 1..];
        let len = after
            .find(|c: char| !is_trigger_char(c))
            .unwrap_or(after.len());
        if len > 0 {
            return Some(Invocation {
                trigger: after[..len].to_ascii_lowercase(),
                rest: &after[len..],
            });
        }
        search_pos = bang + 1;
    }
    None
}

fn is_trigger_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// True if the message contains one of the reserved words as a whole word.
pub fn mentions_reserved_word(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| RESERVED_WORDS.iter().any(|r| word.eq_ignore_ascii_case(r)))
}
