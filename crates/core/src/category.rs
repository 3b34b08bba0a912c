use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The closed set of categories a [`Classification`](crate::announcement::Classification)
/// is allowed to carry at the Store-insert boundary. Anything else — including the
/// literal `"Error"` the Classifier emits on its own failure — is rejected and the
/// job is deferred, never upgraded to Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FinancialResults,
    InvestorPresentation,
    ProceduralAdministrative,
    AgreementsMous,
    AnnualReport,
    AntiDumpingDuty,
    BonusStockSplit,
    Buyback,
    ChangeInAddress,
    ChangeInKmp,
    ChangeInMoa,
    ClarificationsConfirmations,
    ClosureOfFactory,
    ConcallTranscript,
    ConsolidationOfShares,
    CreditRating,
    DebtAndFinancing,
    DebtReduction,
    Delisting,
    Demerger,
    DemiseOfKmp,
    DisruptionOfOperations,
    Divestitures,
    Drhp,
    Expansion,
    FundraisePreferentialIssue,
    FundraiseQip,
    FundraiseRightsIssue,
    GlobalPharmaRegulation,
    IncorporationCessationOfSubsidiary,
    IncreaseInShareCapital,
    InsolvencyAndBankruptcy,
    InterestRatesUpdates,
    InvestorAnalystMeet,
    JointVentures,
    LitigationAndNotices,
    MergersAcquisitions,
    NameChange,
    NewOrder,
    NewProduct,
    OneTimeSettlement,
    OpenOffer,
    OperationalUpdate,
    PliScheme,
    ReductionInShareCapital,
    RegulatoryApprovalsOrders,
    TradingSuspension,
    Usfda,
}

/// All 48 categories in the order the Classifier's schema documents them,
/// used for validation and for listing allowed values in error messages.
pub const ALL_CATEGORIES: &[Category] = &[
    Category::FinancialResults,
    Category::InvestorPresentation,
    Category::ProceduralAdministrative,
    Category::AgreementsMous,
    Category::AnnualReport,
    Category::AntiDumpingDuty,
    Category::BonusStockSplit,
    Category::Buyback,
    Category::ChangeInAddress,
    Category::ChangeInKmp,
    Category::ChangeInMoa,
    Category::ClarificationsConfirmations,
    Category::ClosureOfFactory,
    Category::ConcallTranscript,
    Category::ConsolidationOfShares,
    Category::CreditRating,
    Category::DebtAndFinancing,
    Category::DebtReduction,
    Category::Delisting,
    Category::Demerger,
    Category::DemiseOfKmp,
    Category::DisruptionOfOperations,
    Category::Divestitures,
    Category::Drhp,
    Category::Expansion,
    Category::FundraisePreferentialIssue,
    Category::FundraiseQip,
    Category::FundraiseRightsIssue,
    Category::GlobalPharmaRegulation,
    Category::IncorporationCessationOfSubsidiary,
    Category::IncreaseInShareCapital,
    Category::InsolvencyAndBankruptcy,
    Category::InterestRatesUpdates,
    Category::InvestorAnalystMeet,
    Category::JointVentures,
    Category::LitigationAndNotices,
    Category::MergersAcquisitions,
    Category::NameChange,
    Category::NewOrder,
    Category::NewProduct,
    Category::OneTimeSettlement,
    Category::OpenOffer,
    Category::OperationalUpdate,
    Category::PliScheme,
    Category::ReductionInShareCapital,
    Category::RegulatoryApprovalsOrders,
    Category::TradingSuspension,
    Category::Usfda,
];

impl Category {
    /// The literal the Classifier emits on its own internal failure. Not a
    /// member of the closed enum; checked for separately so callers can tell
    /// "classifier errored" apart from "classifier returned nonsense".
    pub const ERROR_LITERAL: &'static str = "Error";

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FinancialResults => "Financial Results",
            Category::InvestorPresentation => "Investor Presentation",
            Category::ProceduralAdministrative => "Procedural/Administrative",
            Category::AgreementsMous => "Agreements/MoUs",
            Category::AnnualReport => "Annual Report",
            Category::AntiDumpingDuty => "Anti-dumping Duty",
            Category::BonusStockSplit => "Bonus/Stock Split",
            Category::Buyback => "Buyback",
            Category::ChangeInAddress => "Change in Address",
            Category::ChangeInKmp => "Change in KMP",
            Category::ChangeInMoa => "Change in MOA",
            Category::ClarificationsConfirmations => "Clarifications/Confirmations",
            Category::ClosureOfFactory => "Closure of Factory",
            Category::ConcallTranscript => "Concall Transcript",
            Category::ConsolidationOfShares => "Consolidation of Shares",
            Category::CreditRating => "Credit Rating",
            Category::DebtAndFinancing => "Debt & Financing",
            Category::DebtReduction => "Debt Reduction",
            Category::Delisting => "Delisting",
            Category::Demerger => "Demerger",
            Category::DemiseOfKmp => "Demise of KMP",
            Category::DisruptionOfOperations => "Disruption of Operations",
            Category::Divestitures => "Divestitures",
            Category::Drhp => "DRHP",
            Category::Expansion => "Expansion",
            Category::FundraisePreferentialIssue => "Fundraise - Preferential Issue",
            Category::FundraiseQip => "Fundraise - QIP",
            Category::FundraiseRightsIssue => "Fundraise - Rights Issue",
            Category::GlobalPharmaRegulation => "Global Pharma Regulation",
            Category::IncorporationCessationOfSubsidiary => "Incorporation/Cessation of Subsidiary",
            Category::IncreaseInShareCapital => "Increase in Share Capital",
            Category::InsolvencyAndBankruptcy => "Insolvency and Bankruptcy",
            Category::InterestRatesUpdates => "Interest Rates Updates",
            Category::InvestorAnalystMeet => "Investor/Analyst Meet",
            Category::JointVentures => "Joint Ventures",
            Category::LitigationAndNotices => "Litigation & Notices",
            Category::MergersAcquisitions => "Mergers/Acquisitions",
            Category::NameChange => "Name Change",
            Category::NewOrder => "New Order",
            Category::NewProduct => "New Product",
            Category::OneTimeSettlement => "One Time Settlement (OTS)",
            Category::OpenOffer => "Open Offer",
            Category::OperationalUpdate => "Operational Update",
            Category::PliScheme => "PLI Scheme",
            Category::ReductionInShareCapital => "Reduction in Share Capital",
            Category::RegulatoryApprovalsOrders => "Regulatory Approvals/Orders",
            Category::TradingSuspension => "Trading Suspension",
            Category::Usfda => "USFDA",
        }
    }

    /// The category assigned by the negative-keyword shortcut (scraper/replayer),
    /// bypassing the Classifier entirely.
    pub fn procedural_shortcut() -> Category {
        Category::ProceduralAdministrative
    }

    /// The `announcement_categories` column this category counts into —
    /// a `snake_case` slug of [`Category::as_str`], one fixed column per
    /// category (§4.10, §6).
    pub fn column_name(&self) -> &'static str {
        match self {
            Category::FinancialResults => "financial_results",
            Category::InvestorPresentation => "investor_presentation",
            Category::ProceduralAdministrative => "procedural_administrative",
            Category::AgreementsMous => "agreements_mous",
            Category::AnnualReport => "annual_report",
            Category::AntiDumpingDuty => "anti_dumping_duty",
            Category::BonusStockSplit => "bonus_stock_split",
            Category::Buyback => "buyback",
            Category::ChangeInAddress => "change_in_address",
            Category::ChangeInKmp => "change_in_kmp",
            Category::ChangeInMoa => "change_in_moa",
            Category::ClarificationsConfirmations => "clarifications_confirmations",
            Category::ClosureOfFactory => "closure_of_factory",
            Category::ConcallTranscript => "concall_transcript",
            Category::ConsolidationOfShares => "consolidation_of_shares",
            Category::CreditRating => "credit_rating",
            Category::DebtAndFinancing => "debt_and_financing",
            Category::DebtReduction => "debt_reduction",
            Category::Delisting => "delisting",
            Category::Demerger => "demerger",
            Category::DemiseOfKmp => "demise_of_kmp",
            Category::DisruptionOfOperations => "disruption_of_operations",
            Category::Divestitures => "divestitures",
            Category::Drhp => "drhp",
            Category::Expansion => "expansion",
            Category::FundraisePreferentialIssue => "fundraise_preferential_issue",
            Category::FundraiseQip => "fundraise_qip",
            Category::FundraiseRightsIssue => "fundraise_rights_issue",
            Category::GlobalPharmaRegulation => "global_pharma_regulation",
            Category::IncorporationCessationOfSubsidiary => "incorporation_cessation_of_subsidiary",
            Category::IncreaseInShareCapital => "increase_in_share_capital",
            Category::InsolvencyAndBankruptcy => "insolvency_and_bankruptcy",
            Category::InterestRatesUpdates => "interest_rates_updates",
            Category::InvestorAnalystMeet => "investor_analyst_meet",
            Category::JointVentures => "joint_ventures",
            Category::LitigationAndNotices => "litigation_and_notices",
            Category::MergersAcquisitions => "mergers_acquisitions",
            Category::NameChange => "name_change",
            Category::NewOrder => "new_order",
            Category::NewProduct => "new_product",
            Category::OneTimeSettlement => "one_time_settlement",
            Category::OpenOffer => "open_offer",
            Category::OperationalUpdate => "operational_update",
            Category::PliScheme => "pli_scheme",
            Category::ReductionInShareCapital => "reduction_in_share_capital",
            Category::RegulatoryApprovalsOrders => "regulatory_approvals_orders",
            Category::TradingSuspension => "trading_suspension",
            Category::Usfda => "usfda",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Category::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Headlines containing any of these substrings (case-insensitive) never reach
/// the Classifier; they are short-circuited to `Category::ProceduralAdministrative`
/// with a placeholder summary. Mirrors the scraper/replayer's keyword list.
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "Trading Window",
    "Compliance Report",
    "Advertisement(s)",
    "Advertisement",
    "Public Announcement",
    "Share Certificate(s)",
    "Share Certificate",
    "Depositories and Participants",
    "Depository and Participant",
    "Depository and Participants",
    "74(5)",
    "XBRL",
    "Newspaper Publication",
    "Published in the Newspapers",
    "Clippings",
    "Book Closure",
    "Change in Company Secretary/Compliance Officer",
    "Record Date",
    "Code of Conduct",
    "Cessation",
    "Deviation",
    "Declared Interim Dividend",
    "IEPF",
    "Investor Education",
    "Registrar & Share Transfer Agent",
    "Registrar and Share Transfer Agent",
    "Scrutinizers report",
    "Utilisation of Funds",
    "Postal Ballot",
    "Defaults on Payment of Interest",
    "Sustainability Report",
    "Sustainability Reporting",
    "Trading Plan",
    "Letter of Confirmation",
    "Forfeiture/Cancellation",
    "Price movement",
    "Spurt",
    "Grievance Redressal",
    "Monitoring Agency",
    "Regulation 57",
];

/// Keywords that override a negative-keyword match: if present, the headline is
/// treated as substantive regardless of any negative keyword also present.
pub const NEGATIVE_KEYWORD_OVERRIDES: &[&str] = &["Board", "Outcome", "General Updates"];

/// Placeholder summary written when the negative-keyword shortcut fires.
pub const PROCEDURAL_SHORTCUT_SUMMARY: &str = "Please refer to the original document provided.";

/// True if `headline` should bypass the Classifier and be filed directly under
/// `Category::ProceduralAdministrative`.
pub fn matches_negative_keyword(headline: &str) -> bool {
    let lower = headline.to_lowercase();
    if NEGATIVE_KEYWORD_OVERRIDES
        .iter()
        .any(|kw| lower.contains(&kw.to_lowercase()))
    {
        return false;
    }
    NEGATIVE_KEYWORDS
        .iter()
        .any(|kw| lower.contains(&kw.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_categories_round_trip_through_display_and_from_str() {
        for cat in ALL_CATEGORIES {
            let s = cat.to_string();
            let parsed: Category = s.parse().expect("category string must parse back");
            assert_eq!(*cat, parsed);
        }
    }

    #[test]
    fn exactly_forty_eight_categories() {
        assert_eq!(ALL_CATEGORIES.len(), 48);
    }

    #[test]
    fn error_literal_is_not_a_valid_category() {
        assert!("Error".parse::<Category>().is_err());
        assert!("Unknown Something".parse::<Category>().is_err());
    }

    #[test]
    fn negative_keyword_matches_case_insensitively() {
        assert!(matches_negative_keyword("Closure of Trading Window for Q3"));
        assert!(matches_negative_keyword("closure of trading window for q3"));
    }

    #[test]
    fn board_outcome_overrides_a_negative_keyword() {
        // "Record Date" is negative, but announcements mentioning "Board"/"Outcome"
        // are real content even if they also reference a record date in passing.
        assert!(!matches_negative_keyword("Board Outcome also sets Record Date"));
    }

    #[test]
    fn ordinary_headline_does_not_match() {
        assert!(!matches_negative_keyword("Board Meeting Outcome Q1"));
    }
}
