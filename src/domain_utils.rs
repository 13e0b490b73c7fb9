use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BRACKETED_ADDRESS: Regex = Regex::new(r"<([^>]+)>").unwrap();
    static ref LAZY_BRACKETED_ADDRESS: Regex = Regex::new(r"<(.+?)>").unwrap();
    static ref DOMAIN_AFTER_AT: Regex = Regex::new(r"@([^>\s]+)").unwrap();
    static ref URL_SCHEME: Regex = Regex::new(r"^(\w+:)?//").unwrap();
    static ref REFERENCE_TOKEN: Regex = Regex::new(r"[-\w]{25,}").unwrap();
}

/// Domain and address helpers shared by routing and reconciliation.
///
/// Absence of a domain is reported as `None`; none of these functions fail.
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the domain from a `From`/`To` style field.
    ///
    /// `"Jane Doe <jane@Client.com>"` and `"jane@client.com"` both yield
    /// `client.com`. When an angle-bracketed part exists only that part is
    /// considered.
    pub fn domain_from_email_field(value: &str) -> Option<String> {
        if value.is_empty() {
            return None;
        }

        let address = BRACKETED_ADDRESS
            .captures(value)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(value);

        DOMAIN_AFTER_AT
            .captures(address)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    /// Extract the domain from a company website field.
    ///
    /// Strips a leading `scheme://` (or bare `//`) and a leading `www.`, then
    /// keeps everything before the first `/`.
    pub fn domain_from_url_field(value: &str) -> Option<String> {
        let without_scheme = URL_SCHEME.replace(value, "");
        let without_www = without_scheme
            .strip_prefix("www.")
            .unwrap_or(&without_scheme[..]);

        let host = without_www.split('/').next().unwrap_or_default();
        if host.is_empty() {
            None
        } else {
            Some(host.to_lowercase())
        }
    }

    /// Normalize an address field to the bare address, trimmed.
    ///
    /// Unlike [`DomainUtils::domain_from_email_field`] the case is preserved.
    pub fn extract_email(value: &str) -> String {
        match LAZY_BRACKETED_ADDRESS.captures(value).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().trim().to_string(),
            None => value.trim().to_string(),
        }
    }

    /// Pull the identifier token (25+ word characters or dashes) out of a
    /// destination reference such as a spreadsheet link.
    pub fn extract_reference_token(reference: &str) -> Option<&str> {
        REFERENCE_TOKEN.find(reference).map(|m| m.as_str())
    }

    /// Work out which side of an exchange is external to the organization.
    ///
    /// Only exchanges with exactly one internal side have an external domain.
    pub fn external_domain(
        from_domain: Option<&str>,
        to_domain: Option<&str>,
        org_domain: &str,
    ) -> Option<String> {
        let from_internal = from_domain == Some(org_domain);
        let to_internal = to_domain == Some(org_domain);

        match (from_internal, to_internal) {
            (true, false) => to_domain.map(str::to_string),
            (false, true) => from_domain.map(str::to_string),
            _ => None,
        }
    }
}
