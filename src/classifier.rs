//! Line classification for blocklist content.
//!
//! This module is the normalization core: a pure function that maps one
//! raw input line to exactly one [`ClassifiedLine`] variant. It recognizes
//! hosts-file entries, plain domains, wildcard tokens, ABP-style filter
//! rules (including exception rules, option suffixes, and broken wildcard
//! forms), and the canonical Pi-hole anchored regex shapes. Everything it
//! cannot convert into the two-token output vocabulary is discarded.

/// Result of classifying a single input line.
///
/// Hosts carried by `Domain`, `AbpBlock`, and `AbpAllow` are already
/// normalized: lowercased, punycoded, and syntactically validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    /// Blank line, comment, or HTML-ish content.
    Skip,
    /// A plain domain (wildcard tokens keep their leading `*.`).
    Domain(String),
    /// A blocking rule of shape `||host^`.
    AbpBlock(String),
    /// An exception rule of shape `@@||host^`.
    AbpAllow(String),
    /// Recognized but deliberately dropped (element-hiding, unconvertible
    /// regex, invalid domain).
    Discard,
}

/// Hosts-file IP tokens that mark a line as hosts-format.
const HOSTS_IPS: [&str; 5] = ["0.0.0.0", "127.0.0.1", "::", "::1", "fe80::1"];

/// ABP element-hiding separators. Cosmetic rules are never DNS-relevant.
const ELEMENT_HIDING: [&str; 4] = ["#@?#", "#@#", "#?#", "##"];

/// Classify one raw line.
///
/// Pure function: no I/O, no state. Dispatch order is fixed and the first
/// match wins; see the variant docs on [`ClassifiedLine`] for the output
/// vocabulary.
///
/// # Examples
/// ```
/// use adsift::classifier::{classify_line, ClassifiedLine};
/// assert_eq!(
///     classify_line("0.0.0.0 ads.example.com # tracker"),
///     ClassifiedLine::Domain("ads.example.com".into())
/// );
/// assert_eq!(
///     classify_line("||*cdn.site^"),
///     ClassifiedLine::AbpBlock("*.cdn.site".into())
/// );
/// assert_eq!(classify_line("example.com##.banner"), ClassifiedLine::Discard);
/// ```
pub fn classify_line(raw: &str) -> ClassifiedLine {
    let line = raw.trim();
    if line.is_empty() || is_comment_line(line) || is_html_fragment(line) {
        return ClassifiedLine::Skip;
    }

    let line = strip_inline_comment(line).trim_end();

    if ELEMENT_HIDING.iter().any(|sep| line.contains(sep)) {
        return ClassifiedLine::Discard;
    }

    match parse_abp(line) {
        AbpOutcome::Rule { allow: true, host } => return ClassifiedLine::AbpAllow(host),
        AbpOutcome::Rule { allow: false, host } => return ClassifiedLine::AbpBlock(host),
        AbpOutcome::Invalid => return ClassifiedLine::Discard,
        AbpOutcome::NotAbp => {}
    }

    if let Some(classified) = classify_regex(line) {
        return classified;
    }

    let candidate = match hosts_candidate(line) {
        Some(Some(token)) => token,
        // Hosts-format line with nothing but IP tokens.
        Some(None) => return ClassifiedLine::Discard,
        None => line,
    };

    match normalize_host(candidate, true) {
        Some(host) => ClassifiedLine::Domain(host),
        None => ClassifiedLine::Discard,
    }
}

/// Normalize and validate a host candidate.
///
/// Lowercases ASCII, converts IDN labels to punycode, strips surrounding
/// dots/commas, and enforces the label rules: 1-63 chars per label, 253
/// total, `[a-z0-9-]` only, no leading/trailing hyphen, and `*` permitted
/// solely as a full leading label. `require_multi_label` demands at least
/// two labels (plain-domain position); ABP hosts may be single-label.
pub fn normalize_host(candidate: &str, require_multi_label: bool) -> Option<String> {
    let token = candidate.trim().trim_matches(|c| c == '.' || c == ',');
    let (wildcard, core) = match token.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if core.is_empty() {
        return None;
    }

    let core = core.to_ascii_lowercase();
    let core = if core.is_ascii() {
        core
    } else {
        idna::domain_to_ascii(&core).ok()?
    };

    if core.len() > 253 {
        return None;
    }
    let labels: Vec<&str> = core.split('.').collect();
    if require_multi_label && labels.len() < 2 {
        return None;
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return None;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return None;
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return None;
        }
    }

    Some(if wildcard { format!("*.{core}") } else { core })
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('!') || line.starts_with("//") || line.starts_with(';')
}

/// HTML-ish content check: a leading `<`, or `<` directly followed by a
/// tag-opening character anywhere in the line.
fn is_html_fragment(line: &str) -> bool {
    if line.starts_with('<') {
        return true;
    }
    line.char_indices().any(|(i, c)| {
        c == '<'
            && matches!(
                line[i + c.len_utf8()..].chars().next(),
                Some(next) if next.is_ascii_alphabetic() || next == '/' || next == '!' || next == '?'
            )
    })
}

/// Truncate at the first inline comment marker (`#`, `!`, `//`, `;`)
/// preceded by whitespace.
fn strip_inline_comment(line: &str) -> &str {
    for (i, c) in line.char_indices() {
        if c.is_ascii_whitespace() {
            let rest = line[i..].trim_start();
            if rest.starts_with('#')
                || rest.starts_with('!')
                || rest.starts_with("//")
                || rest.starts_with(';')
            {
                return &line[..i];
            }
        }
    }
    line
}

/// Detect a hosts-format line and pick its host candidate.
///
/// Returns `None` when the line is not hosts-format, `Some(None)` when it
/// is but carries no host (bare IPs), and `Some(Some(token))` otherwise.
/// All leading IP-looking tokens are stripped before the candidate is
/// taken.
fn hosts_candidate(line: &str) -> Option<Option<&str>> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if !HOSTS_IPS.contains(&first) {
        return None;
    }
    for token in tokens {
        if token.parse::<std::net::IpAddr>().is_err() {
            return Some(Some(token));
        }
    }
    Some(None)
}

enum AbpOutcome {
    /// The line is not ABP-shaped at all; later steps apply.
    NotAbp,
    /// ABP-shaped but no valid host survives repair.
    Invalid,
    Rule { allow: bool, host: String },
}

/// Recognize and repair an ABP-style rule.
///
/// Accepts `||host^`, `@@||host^`, single-pipe anchors, rules missing
/// their `||` prefix but ending in `^`, trailing `$option` lists, and the
/// broken wildcard forms covered by the repair table. Repair is a single
/// pass and idempotent.
fn parse_abp(line: &str) -> AbpOutcome {
    // Options are meaningless for DNS filtering.
    let entry = match line.find('$') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let entry = entry.trim_end().trim_end_matches('|');

    let (allow, entry) = match entry.strip_prefix("@@") {
        Some(rest) => (true, rest),
        None => (false, entry),
    };

    if !(allow || entry.starts_with('|') || entry.ends_with('^')) {
        return AbpOutcome::NotAbp;
    }

    let part = match entry.strip_prefix("||") {
        Some(rest) => rest,
        None => entry.trim_start_matches('|'),
    };
    let part = part.trim_end_matches(['^', '|']);

    let part = strip_url_noise(part);
    let part = repair_wildcards(part);

    match normalize_host(&part, false) {
        Some(host) => AbpOutcome::Rule { allow, host },
        None => AbpOutcome::Invalid,
    }
}

/// Strip scheme, path, userinfo, and port from an ABP payload so rules
/// like `|https://user@host:8080/p^` still yield their host.
fn strip_url_noise(part: &str) -> &str {
    let mut s = part.strip_prefix("://").unwrap_or(part);
    if let Some(pos) = s.find("://") {
        s = &s[pos + 3..];
    }
    if let Some(pos) = s.find('/') {
        s = &s[..pos];
    }
    if let Some(pos) = s.rfind('@') {
        s = &s[pos + 1..];
    }
    if let Some(pos) = s.find(':') {
        s = &s[..pos];
    }
    s
}

/// Repair table for broken wildcard placement, applied in order:
/// `*cdn.site` gains its dot, a wildcard-only inner label collapses the
/// prefix (`app.*.adjust.com` -> `*.adjust.com`), and a wildcard TLD is
/// dropped (`domain.google.*` -> `domain.google`).
fn repair_wildcards(part: &str) -> String {
    let mut domain = part.to_string();

    if domain.starts_with('*') && !domain.starts_with("*.") {
        match domain[1..].chars().next() {
            Some(next) if next.is_ascii_alphanumeric() => {
                domain = format!("*.{}", &domain[1..]);
            }
            Some('-') | Some('_') => {
                domain = domain[1..].trim_start_matches(['-', '_']).to_string();
            }
            _ => {}
        }
    }

    if let Some(stripped) = domain.strip_suffix(".*") {
        domain = stripped.to_string();
    }

    if domain.contains(".*.") {
        let labels: Vec<&str> = domain.split('.').collect();
        if let Some(idx) = labels.iter().position(|l| *l == "*") {
            domain = format!("*.{}", labels[idx + 1..].join("."));
        }
    }

    while domain.contains("..") {
        domain = domain.replace("..", ".");
    }

    domain.trim_matches('.').to_string()
}

/// Convert the canonical Pi-hole anchored regex shapes, discard every
/// other regex form, and pass everything else through.
fn classify_regex(line: &str) -> Option<ClassifiedLine> {
    if let Some(host) = convert_anchored(line) {
        return Some(ClassifiedLine::AbpBlock(host));
    }

    if line.starts_with('/') {
        if let Some(inner) = unwrap_delimited(line) {
            return Some(match convert_anchored(inner) {
                Some(host) => ClassifiedLine::AbpBlock(host),
                None => ClassifiedLine::Discard,
            });
        }
    }

    if line.starts_with('^') || line.starts_with('(') || line.ends_with('$') {
        return Some(ClassifiedLine::Discard);
    }

    None
}

/// Unwrap `/pattern/` or `/pattern/flags` (ASCII-alpha flags only).
fn unwrap_delimited(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('/')?;
    let pos = rest.rfind('/')?;
    let flags = &rest[pos + 1..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(&rest[..pos])
}

/// Convert `(^|\.)host$`, `^host$`, or `(\.|^)host$` where `host` is made
/// of labels and (escaped) dots only. Dots are unescaped in the result.
fn convert_anchored(pattern: &str) -> Option<String> {
    let body = pattern.strip_suffix('$')?;
    let inner = body
        .strip_prefix("(^|\\.)")
        .or_else(|| body.strip_prefix("(\\.|^)"))
        .or_else(|| body.strip_prefix('^'))?;
    let host = inner.replace("\\.", ".");
    if host.chars().any(|c| {
        matches!(
            c,
            '\\' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | '*' | '?' | '|' | '^' | '$' | '/'
        )
    }) {
        return None;
    }
    normalize_host(&host, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClassifiedLine::{AbpAllow, AbpBlock, Discard, Domain, Skip};

    #[test]
    fn test_skip_blank_and_comments() {
        assert_eq!(classify_line(""), Skip);
        assert_eq!(classify_line("   "), Skip);
        assert_eq!(classify_line("# a comment"), Skip);
        assert_eq!(classify_line("! abp header"), Skip);
        assert_eq!(classify_line("// js style"), Skip);
        assert_eq!(classify_line("; ini style"), Skip);
    }

    #[test]
    fn test_skip_html() {
        assert_eq!(classify_line("<html>ignore</html>"), Skip);
        assert_eq!(classify_line("text <div>inline</div>"), Skip);
        assert_eq!(classify_line("</closing>"), Skip);
    }

    #[test]
    fn test_hosts_line_with_inline_comment() {
        assert_eq!(
            classify_line("0.0.0.0 ads.example.com # tracker"),
            Domain("ads.example.com".into())
        );
    }

    #[test]
    fn test_hosts_line_variants() {
        assert_eq!(
            classify_line("127.0.0.1 another.example"),
            Domain("another.example".into())
        );
        assert_eq!(classify_line("::1 ipv6.local"), Domain("ipv6.local".into()));
        assert_eq!(classify_line(":: nullrouted.example"), Domain("nullrouted.example".into()));
        assert_eq!(
            classify_line("fe80::1 linklocal.example"),
            Domain("linklocal.example".into())
        );
        assert_eq!(
            classify_line("   0.0.0.0   spaced.example   # with comment"),
            Domain("spaced.example".into())
        );
    }

    #[test]
    fn test_hosts_line_multiple_leading_ips() {
        assert_eq!(
            classify_line("0.0.0.0 0.0.0.0 example.com"),
            Domain("example.com".into())
        );
    }

    #[test]
    fn test_bare_hosts_ip_discarded() {
        assert_eq!(classify_line("0.0.0.0"), Discard);
        assert_eq!(classify_line("0.0.0.0   "), Discard);
        assert_eq!(classify_line("::1"), Discard);
    }

    #[test]
    fn test_non_hosts_ip_line_discarded() {
        // 192.168.1.1 is not a hosts-file marker, so the whole line is a
        // (failing) domain candidate.
        assert_eq!(classify_line("192.168.1.1 foo"), Discard);
    }

    #[test]
    fn test_plain_domain() {
        assert_eq!(
            classify_line("plain.example.com"),
            Domain("plain.example.com".into())
        );
        assert_eq!(classify_line("MiXeD.Example.COM"), Domain("mixed.example.com".into()));
    }

    #[test]
    fn test_wildcard_domain_keeps_prefix() {
        assert_eq!(classify_line("*.wild.example"), Domain("*.wild.example".into()));
    }

    #[test]
    fn test_trailing_dot_stripped() {
        assert_eq!(classify_line("dotted.example."), Domain("dotted.example".into()));
    }

    #[test]
    fn test_single_label_rejected_as_plain_domain() {
        assert_eq!(classify_line("localhost"), Discard);
    }

    #[test]
    fn test_idn_punycoded() {
        assert_eq!(classify_line("täst.de"), Domain("xn--tst-qla.de".into()));
        assert_eq!(
            classify_line("*.münich.de"),
            Domain("*.xn--mnich-kva.de".into())
        );
    }

    #[test]
    fn test_invalid_labels_discarded() {
        assert_eq!(classify_line("-bad.start"), Discard);
        assert_eq!(classify_line("bad.end-"), Discard);
        assert_eq!(classify_line("under_score.example"), Discard);
        assert_eq!(classify_line("..."), Discard);
    }

    #[test]
    fn test_abp_block_rule() {
        assert_eq!(classify_line("||block.example^"), AbpBlock("block.example".into()));
    }

    #[test]
    fn test_abp_exception_rule() {
        assert_eq!(classify_line("@@||allow.example^"), AbpAllow("allow.example".into()));
    }

    #[test]
    fn test_abp_option_suffix_stripped() {
        assert_eq!(
            classify_line("||host.example^$third-party,script"),
            AbpBlock("host.example".into())
        );
    }

    #[test]
    fn test_abp_wildcard_missing_dot() {
        assert_eq!(classify_line("||*cdn.site^"), AbpBlock("*.cdn.site".into()));
    }

    #[test]
    fn test_abp_inner_wildcard_collapses() {
        assert_eq!(
            classify_line("||app.*.adjust.com^"),
            AbpBlock("*.adjust.com".into())
        );
    }

    #[test]
    fn test_abp_wildcard_tld_dropped() {
        assert_eq!(
            classify_line("||domain.google.*^"),
            AbpBlock("domain.google".into())
        );
    }

    #[test]
    fn test_abp_single_pipe_anchors_fixed() {
        assert_eq!(classify_line("@@|domain.com^|"), AbpAllow("domain.com".into()));
    }

    #[test]
    fn test_abp_missing_prefix_with_caret() {
        assert_eq!(classify_line("plain.example^"), AbpBlock("plain.example".into()));
        // Repaired prefix does not rescue an invalid host.
        assert_eq!(classify_line("-host.com^"), Discard);
    }

    #[test]
    fn test_abp_url_noise_stripped() {
        assert_eq!(
            classify_line("|https://user@host:8080/p^"),
            AbpBlock("host".into())
        );
    }

    #[test]
    fn test_element_hiding_discarded() {
        assert_eq!(classify_line("example.com##.banner"), Discard);
        assert_eq!(classify_line("example.com#@#.ad"), Discard);
        assert_eq!(classify_line("example.com#?#.probe"), Discard);
        assert_eq!(classify_line("example.com#@?#.unhide"), Discard);
    }

    #[test]
    fn test_pihole_regex_conversion() {
        assert_eq!(
            classify_line(r"(^|\.)ads\.example\.org$"),
            AbpBlock("ads.example.org".into())
        );
        assert_eq!(
            classify_line(r"(\.|^)track\.example$"),
            AbpBlock("track.example".into())
        );
        assert_eq!(classify_line(r"^exact\.example$"), AbpBlock("exact.example".into()));
    }

    #[test]
    fn test_pihole_regex_unescaped_dots_accepted() {
        assert_eq!(
            classify_line("(^|\\.)regex.example$"),
            AbpBlock("regex.example".into())
        );
    }

    #[test]
    fn test_delimited_regex() {
        assert_eq!(
            classify_line(r"/(^|\.)ex\.tld$/"),
            AbpBlock("ex.tld".into())
        );
        assert_eq!(
            classify_line(r"/(^|\.)ex\.tld$/i"),
            AbpBlock("ex.tld".into())
        );
        assert_eq!(classify_line("/ads/"), Discard);
    }

    #[test]
    fn test_complex_regex_discarded() {
        assert_eq!(classify_line(r"^(?:sub\.)*foo\.bar$"), Discard);
        assert_eq!(classify_line(r"(x+)baz$"), Discard);
        assert_eq!(classify_line("not-a-domain$"), Discard);
        assert_eq!(classify_line(r"^foo|bar$"), Discard);
    }

    #[test]
    fn test_classify_is_whitespace_invariant() {
        for line in [
            "||block.example^",
            "0.0.0.0 ads.example.com",
            "plain.example.com",
            "# comment",
        ] {
            let padded = format!("  {line}  ");
            assert_eq!(classify_line(&padded), classify_line(line));
        }
    }

    #[test]
    fn test_normalize_host_length_limits() {
        let long_label = "a".repeat(64);
        assert_eq!(normalize_host(&format!("{long_label}.com"), true), None);
        let ok_label = "a".repeat(63);
        assert!(normalize_host(&format!("{ok_label}.com"), true).is_some());
        let long_host = format!("{}.{}", "a".repeat(63), "b.".repeat(100)) + "com";
        assert_eq!(normalize_host(&long_host, true), None);
    }

    #[test]
    fn test_normalize_host_wildcard_placement() {
        assert!(normalize_host("*.ok.example", false).is_some());
        assert_eq!(normalize_host("mid*.example", false), None);
        assert_eq!(normalize_host("a.*.b", false), None);
    }

    #[test]
    fn test_repair_wildcards_is_idempotent() {
        for raw in ["*cdn.site", "app.*.adjust.com", "domain.google.*", "a..b"] {
            let once = repair_wildcards(raw);
            assert_eq!(repair_wildcards(&once), once);
        }
    }
}
