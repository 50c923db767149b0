use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Monitored deployment whose logs are queried
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Full deployment URI, e.g. `ues:TERR:ART:app-code`
    Uri(String),
    /// Bare application instance id (asid)
    InstanceId(String),
}

impl Target {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("ues:") {
            Target::Uri(value.to_string())
        } else {
            Target::InstanceId(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Target::Uri(uri) => uri,
            Target::InstanceId(id) => id,
        }
    }

    /// Short label for console output: the URI's object code, or the raw id
    pub fn label(&self) -> String {
        match self {
            Target::Uri(uri) => UesUri::parse(uri)
                .and_then(|parsed| parsed.object.code)
                .unwrap_or_else(|| uri.clone()),
            Target::InstanceId(id) => id.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UesPart {
    pub code: Option<String>,
    pub id: Option<String>,
}

impl UesPart {
    fn is_empty(&self) -> bool {
        self.code.is_none() && self.id.is_none()
    }
}

/// `ues:<territory>[oid]:<artifact>[oid](:<object>[oid])?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UesUri {
    pub territory: UesPart,
    pub artifact: UesPart,
    pub object: UesPart,
}

fn ues_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^ues:(?P<ter_code>[\w.\-]*?)(\[(?P<ter_oid>\w*?)\])?:(?P<art_code>[\w.\-]*?)(\[(?P<art_oid>\w*?)\])?(:(?P<obj_code>[\w.\-]*?)(\[(?P<obj_oid>\w*?)\])?)?$",
        )
        .expect("UES URI pattern is valid")
    })
}

impl UesUri {
    /// Parse a UES URI; territory and artifact must each carry a code or an oid.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = ues_regex().captures(value)?;
        let part = |code: &str, oid: &str| UesPart {
            code: caps
                .name(code)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty()),
            id: caps
                .name(oid)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty()),
        };

        let uri = UesUri {
            territory: part("ter_code", "ter_oid"),
            artifact: part("art_code", "art_oid"),
            object: part("obj_code", "obj_oid"),
        };

        if uri.territory.is_empty() || uri.artifact.is_empty() {
            return None;
        }
        Some(uri)
    }
}
