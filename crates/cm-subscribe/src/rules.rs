//! Static routing rule table.
//! [Chinese] 静态路由规则表（只读，进程启动时加载一次）。
use crate::model::SubsError;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;

const BUILTIN_RULES: &str = include_str!("../assets/rules.list");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Domain,
    DomainSuffix,
    DomainKeyword,
    IpCidr,
    IpCidr6,
    GeoIp,
    Match,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "DOMAIN",
            Self::DomainSuffix => "DOMAIN-SUFFIX",
            Self::DomainKeyword => "DOMAIN-KEYWORD",
            Self::IpCidr => "IP-CIDR",
            Self::IpCidr6 => "IP-CIDR6",
            Self::GeoIp => "GEOIP",
            Self::Match => "MATCH",
        }
    }
}

impl FromStr for RuleKind {
    type Err = SubsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DOMAIN" => Self::Domain,
            "DOMAIN-SUFFIX" => Self::DomainSuffix,
            "DOMAIN-KEYWORD" => Self::DomainKeyword,
            "IP-CIDR" => Self::IpCidr,
            "IP-CIDR6" => Self::IpCidr6,
            "GEOIP" => Self::GeoIp,
            "MATCH" => Self::Match,
            other => return Err(SubsError::RecordParse(format!("unknown rule kind {other}"))),
        })
    }
}

/// `TYPE,VALUE,POLICY[,no-resolve]`, or `MATCH,POLICY` for the catch-all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub kind: RuleKind,
    pub value: String,
    pub policy: String,
    pub no_resolve: bool,
}

impl RuleEntry {
    pub fn catch_all(policy: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Match,
            value: String::new(),
            policy: policy.into(),
            no_resolve: false,
        }
    }
}

impl fmt::Display for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == RuleKind::Match {
            return write!(f, "MATCH,{}", self.policy);
        }
        write!(f, "{},{},{}", self.kind.as_str(), self.value, self.policy)?;
        if self.no_resolve {
            f.write_str(",no-resolve")?;
        }
        Ok(())
    }
}

impl FromStr for RuleEntry {
    type Err = SubsError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let kind: RuleKind = parts[0].parse()?;
        match (kind, parts.as_slice()) {
            (RuleKind::Match, [_, policy]) => Ok(Self::catch_all(*policy)),
            (RuleKind::Match, _) => Err(SubsError::RecordParse(format!("bad MATCH rule: {line}"))),
            (_, [_, value, policy]) => Ok(Self {
                kind,
                value: value.to_string(),
                policy: policy.to_string(),
                no_resolve: false,
            }),
            (_, [_, value, policy, "no-resolve"]) => Ok(Self {
                kind,
                value: value.to_string(),
                policy: policy.to_string(),
                no_resolve: true,
            }),
            _ => Err(SubsError::RecordParse(format!("bad rule: {line}"))),
        }
    }
}

/// Parse a rule list: one rule per line, `#` comments and blank lines skipped.
pub fn parse_rule_list(text: &str) -> Result<Vec<RuleEntry>, SubsError> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::parse)
        .collect()
}

static RULES: Lazy<Vec<RuleEntry>> = Lazy::new(|| match parse_rule_list(BUILTIN_RULES) {
    Ok(rules) => rules,
    Err(e) => {
        tracing::error!(error = %e, "built-in rule table is malformed");
        Vec::new()
    }
});

/// The built-in table, without the trailing catch-all.
pub fn builtin_rules() -> &'static [RuleEntry] {
    &RULES
}
