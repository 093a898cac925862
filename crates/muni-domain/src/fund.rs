//! Governmental fund classifications.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Fixed enumeration of governmental accounting fund categories.
pub enum FundType {
    General,
    SpecialRevenue,
    DebtService,
    CapitalProjects,
    Permanent,
    Enterprise,
    InternalService,
    PensionTrust,
    InvestmentTrust,
    PrivatePurposeTrust,
    Custodial,
}

impl FundType {
    pub const ALL: [FundType; 11] = [
        FundType::General,
        FundType::SpecialRevenue,
        FundType::DebtService,
        FundType::CapitalProjects,
        FundType::Permanent,
        FundType::Enterprise,
        FundType::InternalService,
        FundType::PensionTrust,
        FundType::InvestmentTrust,
        FundType::PrivatePurposeTrust,
        FundType::Custodial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FundType::General => "General",
            FundType::SpecialRevenue => "Special Revenue",
            FundType::DebtService => "Debt Service",
            FundType::CapitalProjects => "Capital Projects",
            FundType::Permanent => "Permanent",
            FundType::Enterprise => "Enterprise",
            FundType::InternalService => "Internal Service",
            FundType::PensionTrust => "Pension Trust",
            FundType::InvestmentTrust => "Investment Trust",
            FundType::PrivatePurposeTrust => "Private-Purpose Trust",
            FundType::Custodial => "Custodial",
        }
    }

    /// Case- and punctuation-tolerant lookup, used when ingesting
    /// spreadsheet rows (`"special revenue"`, `"Special-Revenue"`, ...).
    pub fn parse(input: &str) -> Option<FundType> {
        let folded: String = input
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|fund| {
                let label: String = fund
                    .as_str()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                label == folded
            })
    }
}

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
