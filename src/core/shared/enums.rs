//! Database enum types for the CRM schema.
//!
//! Each enum maps to a PostgreSQL SMALLINT column and derives the traits
//! needed for Diesel ORM integration. Wire representations (serde) match
//! the public API vocabulary.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

macro_rules! smallint_enum_sql {
    ($name:ident { $($value:literal => $variant:ident),+ $(,)? }) => {
        impl ToSql<SmallInt, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                let v = *self as i16;
                out.write_all(&v.to_be_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<SmallInt, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = i16::from_sql(bytes)?;
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("Unknown ", stringify!($name), ": {}"), value).into()),
                }
            }
        }
    };
}

// ============================================================================
// LEAD FUNNEL
// ============================================================================

/// Stage of a lead in the sales funnel.
///
/// Transitions are validated: a lead advances one stage at a time
/// (open -> contacted -> qualified -> proposal -> negotiation) and may drop
/// to `closed` or `lost` from any non-terminal stage. Terminal stages are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum LeadStatus {
    Open = 0,
    Contacted = 1,
    Qualified = 2,
    Proposal = 3,
    Negotiation = 4,
    Closed = 5,
    Lost = 6,
}

impl Default for LeadStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl LeadStatus {
    /// The non-terminal funnel stages, in order.
    pub const OPEN_STAGES: [Self; 5] = [
        Self::Open,
        Self::Contacted,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Lost)
    }

    /// The next stage in the funnel, if any.
    pub fn next_stage(self) -> Option<Self> {
        match self {
            Self::Open => Some(Self::Contacted),
            Self::Contacted => Some(Self::Qualified),
            Self::Qualified => Some(Self::Proposal),
            Self::Proposal => Some(Self::Negotiation),
            Self::Negotiation | Self::Closed | Self::Lost => None,
        }
    }

    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition(self, to: Self) -> bool {
        if self == to {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if to.is_terminal() {
            return true;
        }
        self.next_stage() == Some(to)
    }
}

smallint_enum_sql!(LeadStatus {
    0 => Open,
    1 => Contacted,
    2 => Qualified,
    3 => Proposal,
    4 => Negotiation,
    5 => Closed,
    6 => Lost,
});

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::Closed => "closed",
            Self::Lost => "lost",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "proposal" => Ok(Self::Proposal),
            "negotiation" => Ok(Self::Negotiation),
            "closed" => Ok(Self::Closed),
            "lost" => Ok(Self::Lost),
            _ => Err(format!("invalid lead status: {s}")),
        }
    }
}

/// Temperature classification of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum LeadType {
    Hot = 0,
    Warm = 1,
    Cold = 2,
}

impl Default for LeadType {
    fn default() -> Self {
        Self::Warm
    }
}

smallint_enum_sql!(LeadType { 0 => Hot, 1 => Warm, 2 => Cold });

impl std::fmt::Display for LeadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LeadType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            _ => Err(format!("invalid lead type: {s}")),
        }
    }
}

/// Origin channel of a lead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = SmallInt)]
#[repr(i16)]
pub enum LeadSource {
    Website = 0,
    Referral = 1,
    #[serde(rename = "Cold Call")]
    ColdCall = 2,
    #[serde(rename = "Social Media")]
    SocialMedia = 3,
    #[serde(rename = "Email Campaign")]
    EmailCampaign = 4,
    #[serde(rename = "Trade Show")]
    TradeShow = 5,
    Advertisement = 6,
    Other = 7,
}

impl Default for LeadSource {
    fn default() -> Self {
        Self::Website
    }
}

smallint_enum_sql!(LeadSource {
    0 => Website,
    1 => Referral,
    2 => ColdCall,
    3 => SocialMedia,
    4 => EmailCampaign,
    5 => TradeShow,
    6 => Advertisement,
    7 => Other,
});

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Website => "Website",
            Self::Referral => "Referral",
            Self::ColdCall => "Cold Call",
            Self::SocialMedia => "Social Media",
            Self::EmailCampaign => "Email Campaign",
            Self::TradeShow => "Trade Show",
            Self::Advertisement => "Advertisement",
            Self::Other => "Other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LeadSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "website" => Ok(Self::Website),
            "referral" => Ok(Self::Referral),
            "cold call" => Ok(Self::ColdCall),
            "social media" => Ok(Self::SocialMedia),
            "email campaign" => Ok(Self::EmailCampaign),
            "trade show" => Ok(Self::TradeShow),
            "advertisement" => Ok(Self::Advertisement),
            "other" => Ok(Self::Other),
            _ => Err(format!("invalid lead source: {s}")),
        }
    }
}

/// Monetary currency of a lead's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i16)]
pub enum Currency {
    Usd = 0,
    Eur = 1,
    Gbp = 2,
    Cad = 3,
    Aud = 4,
    Jpy = 5,
    Inr = 6,
}

impl Default for Currency {
    fn default() -> Self {
        Self::Usd
    }
}

smallint_enum_sql!(Currency {
    0 => Usd,
    1 => Eur,
    2 => Gbp,
    3 => Cad,
    4 => Aud,
    5 => Jpy,
    6 => Inr,
});

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Jpy => "JPY",
            Self::Inr => "INR",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Currency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "JPY" => Ok(Self::Jpy),
            "INR" => Ok(Self::Inr),
            _ => Err(format!("invalid currency: {s}")),
        }
    }
}

/// Kind of a scheduled call on a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum CallType {
    ColdCall = 0,
    FollowUp = 1,
    Discovery = 2,
    Presentation = 3,
    Closing = 4,
}

smallint_enum_sql!(CallType {
    0 => ColdCall,
    1 => FollowUp,
    2 => Discovery,
    3 => Presentation,
    4 => Closing,
});

// ============================================================================
// EMPLOYEES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum EmployeeRole {
    Admin = 0,
    Employee = 1,
}

impl Default for EmployeeRole {
    fn default() -> Self {
        Self::Employee
    }
}

smallint_enum_sql!(EmployeeRole { 0 => Admin, 1 => Employee });

impl std::str::FromStr for EmployeeRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "employee" => Ok(Self::Employee),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum EmployeeStatus {
    Active = 0,
    Inactive = 1,
}

impl Default for EmployeeStatus {
    fn default() -> Self {
        Self::Active
    }
}

smallint_enum_sql!(EmployeeStatus { 0 => Active, 1 => Inactive });

impl std::str::FromStr for EmployeeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("invalid status: {s}")),
        }
    }
}

// ============================================================================
// ACTIVITY LOG
// ============================================================================

/// Lifecycle event kinds recorded in the activity log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ActivityAction {
    Login = 0,
    Logout = 1,
    LeadCreated = 2,
    LeadUpdated = 3,
    LeadAssigned = 4,
    LeadClosed = 5,
    EmployeeCreated = 6,
    EmployeeUpdated = 7,
    EmployeeDeleted = 8,
    CsvUploaded = 9,
    CallScheduled = 10,
    FollowUpScheduled = 11,
    NoteAdded = 12,
    StatusChanged = 13,
    LeadImported = 14,
    LeadDeleted = 15,
}

smallint_enum_sql!(ActivityAction {
    0 => Login,
    1 => Logout,
    2 => LeadCreated,
    3 => LeadUpdated,
    4 => LeadAssigned,
    5 => LeadClosed,
    6 => EmployeeCreated,
    7 => EmployeeUpdated,
    8 => EmployeeDeleted,
    9 => CsvUploaded,
    10 => CallScheduled,
    11 => FollowUpScheduled,
    12 => NoteAdded,
    13 => StatusChanged,
    14 => LeadImported,
    15 => LeadDeleted,
});

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::LeadCreated => "lead_created",
            Self::LeadUpdated => "lead_updated",
            Self::LeadAssigned => "lead_assigned",
            Self::LeadClosed => "lead_closed",
            Self::EmployeeCreated => "employee_created",
            Self::EmployeeUpdated => "employee_updated",
            Self::EmployeeDeleted => "employee_deleted",
            Self::CsvUploaded => "csv_uploaded",
            Self::CallScheduled => "call_scheduled",
            Self::FollowUpScheduled => "follow_up_scheduled",
            Self::NoteAdded => "note_added",
            Self::StatusChanged => "status_changed",
            Self::LeadImported => "lead_imported",
            Self::LeadDeleted => "lead_deleted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum EntityType {
    Lead = 0,
    Employee = 1,
    System = 2,
    Auth = 3,
}

smallint_enum_sql!(EntityType { 0 => Lead, 1 => Employee, 2 => System, 3 => Auth });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

smallint_enum_sql!(Severity { 0 => Low, 1 => Medium, 2 => High, 3 => Critical });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funnel_advances_one_stage_at_a_time() {
        assert!(LeadStatus::Open.can_transition(LeadStatus::Contacted));
        assert!(LeadStatus::Contacted.can_transition(LeadStatus::Qualified));
        assert!(LeadStatus::Qualified.can_transition(LeadStatus::Proposal));
        assert!(LeadStatus::Proposal.can_transition(LeadStatus::Negotiation));
        assert!(LeadStatus::Negotiation.can_transition(LeadStatus::Closed));

        assert!(!LeadStatus::Open.can_transition(LeadStatus::Qualified));
        assert!(!LeadStatus::Contacted.can_transition(LeadStatus::Open));
        assert!(!LeadStatus::Proposal.can_transition(LeadStatus::Contacted));
    }

    #[test]
    fn any_open_stage_may_close_or_lose() {
        for status in [
            LeadStatus::Open,
            LeadStatus::Contacted,
            LeadStatus::Qualified,
            LeadStatus::Proposal,
            LeadStatus::Negotiation,
        ] {
            assert!(status.can_transition(LeadStatus::Closed), "{status} -> closed");
            assert!(status.can_transition(LeadStatus::Lost), "{status} -> lost");
        }
    }

    #[test]
    fn terminal_stages_are_absorbing() {
        assert!(!LeadStatus::Closed.can_transition(LeadStatus::Open));
        assert!(!LeadStatus::Closed.can_transition(LeadStatus::Lost));
        assert!(!LeadStatus::Lost.can_transition(LeadStatus::Closed));
        assert!(!LeadStatus::Lost.can_transition(LeadStatus::Contacted));
        // A no-op transition is tolerated even on terminals.
        assert!(LeadStatus::Closed.can_transition(LeadStatus::Closed));
    }

    #[test]
    fn source_strings_round_trip() {
        for s in ["Website", "Cold Call", "Email Campaign", "Trade Show"] {
            let parsed: LeadSource = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("Billboard".parse::<LeadSource>().is_err());
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("Open".parse::<LeadStatus>().unwrap(), LeadStatus::Open);
        assert_eq!(" closed ".parse::<LeadStatus>().unwrap(), LeadStatus::Closed);
        assert!("done".parse::<LeadStatus>().is_err());
    }
}
