//! Email and domain helpers used to place a user into a team.

/// An email address split into its local part and domain, both lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    pub local: String,
    pub domain: String,
}

/// Split an email address at its single `@`.
///
/// Returns `None` when there is no `@`, more than one, or either side is
/// empty. Callers check the domain with [`is_valid_domain`] before using it
/// to place a user into a team.
pub fn parse_email(email: &str) -> Option<ParsedEmail> {
    let lowered = email.trim().to_lowercase();
    let (local, domain) = lowered.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(ParsedEmail {
        local: local.to_string(),
        domain: domain.to_string(),
    })
}

/// Whether `domain` can place a user into a team.
///
/// The domain must be non-empty, contain no whitespace or `@`, and yield a
/// non-empty slug. Internationalized, single-label and underscored domains
/// are accepted; ADFS deployments commonly use them as UPN suffixes.
pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && !domain.contains(|c: char| c.is_whitespace() || c == '@')
        && !slugify_domain(domain).is_empty()
}

/// Form a URL-safe team subdomain from an email domain.
///
/// The top-level label is removed and the remaining labels are joined and
/// slugified: lowercase, every non-alphanumeric run becomes a single `-`,
/// and leading/trailing hyphens are trimmed. `example.com` gives `example`,
/// `mail.Example.co` gives `mail-example`.
pub fn slugify_domain(domain: &str) -> String {
    let without_tld = match domain.rsplit_once('.') {
        Some((rest, _tld)) => rest,
        None => domain,
    };
    slugify(without_tld)
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
