//! The USSD menu as a transition function.
//!
//! [`MenuMachine::advance`] maps the stored session and one line of input to
//! the next menu position, the text to show and the side effects to perform.
//! It never writes anything itself; the only I/O is the read-only candidate
//! lookup in ENTER_GROUP_CODE.

use crate::domain::money::{Amount, CURRENCY};
use crate::domain::ports::CandidateDirectoryRef;
use crate::domain::session::{CandidateChoice, Menu, MenuStateKind, Session, VoteOrder};
use crate::error::Result;
use tracing::debug;

pub const GROUP_CODE_PROMPT: &str = "Enter group code number:";
pub const INVALID_CODE: &str = "Invalid code. Please try again:";
pub const INVALID_VOTE_COUNT: &str = "Invalid number. Please enter a valid number of votes:";
pub const INVALID_SELECTION: &str = "Invalid selection";
pub const VOTE_CANCELLED: &str = "Vote cancelled";
pub const INVALID_PIN: &str = "Invalid PIN. Please enter your MoMo PIN:";
pub const PAYMENT_ALREADY_SENT: &str =
    "Your payment request has already been sent. Please approve it on your phone.";
pub const DONATION_PROMPT: &str = "Enter donation amount (GHS):";
pub const INVALID_DONATION: &str = "Invalid amount. Please enter a valid donation amount (GHS):";
pub const DONATION_CANCELLED: &str = "Donation cancelled";
pub const DONATION_REPROMPT: &str = "Invalid selection. Please choose:\n1. Confirm\n2. Cancel";

/// Knobs of the menu that do not come from the candidate directory.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuConfig {
    pub campaign: String,
    pub unit_price: Amount,
    pub vote_ceiling: u32,
    pub donation_ceiling: Amount,
    /// Re-enables the ENTER_MOMO_PIN step between confirmation and payment.
    pub legacy_pin_capture: bool,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            campaign: "Borbor Carnival 25".to_string(),
            unit_price: Amount::ONE,
            vote_ceiling: 1000,
            donation_ceiling: Amount::ONE_THOUSAND,
            legacy_pin_capture: false,
        }
    }
}

/// Text shown to the subscriber and whether the session ends with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    pub end: bool,
}

impl Reply {
    pub fn prompt(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            end: false,
        }
    }

    pub fn end(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            end: true,
        }
    }
}

/// Work the driver performs on behalf of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Create a pending vote record and dispatch its payment.
    RecordVote(VoteOrder),
    /// Dispatch a donation payment; the record is created by the payment client.
    DispatchDonation(Amount),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub menu: Menu,
    pub prev_menu_state: Option<MenuStateKind>,
    pub reply: Reply,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(session: &Session, message: impl Into<String>) -> Self {
        Self {
            menu: session.menu.clone(),
            prev_menu_state: session.prev_menu_state,
            reply: Reply::prompt(message),
            effects: Vec::new(),
        }
    }

    fn goto(session: &Session, menu: Menu, message: impl Into<String>) -> Self {
        Self {
            menu,
            prev_menu_state: Some(session.menu.kind()),
            reply: Reply::prompt(message),
            effects: Vec::new(),
        }
    }

    fn end(session: &Session, message: impl Into<String>) -> Self {
        Self {
            menu: session.menu.clone(),
            prev_menu_state: session.prev_menu_state,
            reply: Reply::end(message),
            effects: Vec::new(),
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCountError {
    Invalid,
    AboveCeiling,
}

/// Accepts a positive integer without leading zeros, up to `ceiling`.
pub fn parse_vote_count(input: &str, ceiling: u32) -> std::result::Result<u32, VoteCountError> {
    let input = input.trim();
    let mut chars = input.chars();
    if !matches!(chars.next(), Some('1'..='9')) || !chars.all(|c| c.is_ascii_digit()) {
        return Err(VoteCountError::Invalid);
    }
    // Digits only at this point, so a parse failure is an overflow.
    match input.parse::<u32>() {
        Ok(count) if count <= ceiling => Ok(count),
        _ => Err(VoteCountError::AboveCeiling),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationError {
    Invalid,
    AboveCeiling,
}

pub fn parse_donation_amount(
    input: &str,
    ceiling: Amount,
) -> std::result::Result<Amount, DonationError> {
    let amount: Amount = input.parse().map_err(|_| DonationError::Invalid)?;
    if amount > ceiling {
        return Err(DonationError::AboveCeiling);
    }
    Ok(amount)
}

fn is_pin(input: &str) -> bool {
    (4..=6).contains(&input.len()) && input.chars().all(|c| c.is_ascii_digit())
}

pub struct MenuMachine {
    config: MenuConfig,
    candidates: CandidateDirectoryRef,
}

impl MenuMachine {
    pub fn new(config: MenuConfig, candidates: CandidateDirectoryRef) -> Self {
        Self { config, candidates }
    }

    pub fn config(&self) -> &MenuConfig {
        &self.config
    }

    pub fn main_menu(&self) -> String {
        format!("Welcome to {}\n1. Vote\n2. Donate", self.config.campaign)
    }

    pub async fn advance(&self, session: &Session, input: &str) -> Result<Transition> {
        let input = input.trim();

        if input == "0" {
            return Ok(self.reset());
        }
        if input.eq_ignore_ascii_case("b") {
            return Ok(self.back(session));
        }

        debug!(
            session_id = %session.session_id,
            state = %session.menu.kind(),
            "advancing menu"
        );

        let transition = match &session.menu {
            Menu::MainMenu => self.on_main_menu(session, input),
            Menu::EnterGroupCode => self.on_group_code(session, input).await?,
            Menu::EnterVoteCount { candidate } => self.on_vote_count(session, candidate, input),
            Menu::ConfirmVotePayment { order } => self.on_confirm_vote(session, order, input),
            Menu::EnterMomoPin { order } => self.on_momo_pin(session, order, input),
            Menu::DonateFlow => self.on_donate_flow(),
            Menu::EnterDonationAmount => self.on_donation_amount(session, input),
            Menu::ConfirmDonation { amount } => self.on_confirm_donation(session, *amount, input),
        };
        Ok(transition)
    }

    fn reset(&self) -> Transition {
        Transition {
            menu: Menu::MainMenu,
            prev_menu_state: None,
            reply: Reply::prompt(self.main_menu()),
            effects: Vec::new(),
        }
    }

    /// Only ENTER_GROUP_CODE is restored; any other previous state lands on
    /// the main menu.
    fn back(&self, session: &Session) -> Transition {
        match session.prev_menu_state {
            Some(MenuStateKind::EnterGroupCode) => Transition {
                menu: Menu::EnterGroupCode,
                prev_menu_state: Some(MenuStateKind::MainMenu),
                reply: Reply::prompt(GROUP_CODE_PROMPT),
                effects: Vec::new(),
            },
            _ => self.reset(),
        }
    }

    fn on_main_menu(&self, session: &Session, input: &str) -> Transition {
        match input {
            "1" => Transition::goto(session, Menu::EnterGroupCode, GROUP_CODE_PROMPT),
            // No extra round trip: DONATE_FLOW runs right away.
            "2" => self.on_donate_flow(),
            _ => Transition::end(session, INVALID_SELECTION),
        }
    }

    async fn on_group_code(&self, session: &Session, input: &str) -> Result<Transition> {
        if input.is_empty() {
            return Ok(Transition::stay(session, INVALID_CODE));
        }
        let Some(candidate) = self.candidates.find_active_by_code(input).await? else {
            return Ok(Transition::stay(session, INVALID_CODE));
        };

        let message = format!(
            "You have selected: {}\nEnter number of votes ({CURRENCY}{} per vote):",
            candidate.name, self.config.unit_price
        );
        let candidate = CandidateChoice::from(&candidate);
        Ok(Transition::goto(
            session,
            Menu::EnterVoteCount { candidate },
            message,
        ))
    }

    fn on_vote_count(
        &self,
        session: &Session,
        candidate: &CandidateChoice,
        input: &str,
    ) -> Transition {
        let votes = match parse_vote_count(input, self.config.vote_ceiling) {
            Ok(votes) => votes,
            Err(VoteCountError::Invalid) => return Transition::stay(session, INVALID_VOTE_COUNT),
            Err(VoteCountError::AboveCeiling) => {
                return Transition::stay(
                    session,
                    format!(
                        "Maximum {} votes allowed. Please enter a valid number:",
                        self.config.vote_ceiling
                    ),
                );
            }
        };
        let Ok(amount) = Amount::for_units(votes, self.config.unit_price) else {
            return Transition::stay(session, INVALID_VOTE_COUNT);
        };

        let message = format!(
            "Confirm Payment:\nCandidate: {}\nVotes: {votes}\nAmount: {CURRENCY}{amount}\n\n1. Confirm\n2. Cancel",
            candidate.name
        );
        let order = VoteOrder {
            candidate: candidate.clone(),
            votes,
            amount,
        };
        Transition::goto(session, Menu::ConfirmVotePayment { order }, message)
    }

    fn on_confirm_vote(&self, session: &Session, order: &VoteOrder, input: &str) -> Transition {
        match input {
            "1" if self.config.legacy_pin_capture => Transition::goto(
                session,
                Menu::EnterMomoPin {
                    order: order.clone(),
                },
                format!(
                    "Enter your MoMo PIN to authorize {CURRENCY}{}:",
                    order.amount
                ),
            ),
            "1" => Transition::goto(
                session,
                Menu::EnterMomoPin {
                    order: order.clone(),
                },
                self.approval_notice(session),
            )
            .with_effect(Effect::RecordVote(order.clone())),
            "2" => Transition::end(session, VOTE_CANCELLED),
            _ => Transition::end(session, INVALID_SELECTION),
        }
    }

    /// Legacy step. The PIN itself is only checked for shape and then dropped;
    /// the handset collects the real authorization out of band.
    fn on_momo_pin(&self, session: &Session, order: &VoteOrder, input: &str) -> Transition {
        if !self.config.legacy_pin_capture {
            return Transition::end(session, PAYMENT_ALREADY_SENT);
        }
        if !is_pin(input) {
            return Transition::stay(session, INVALID_PIN);
        }
        Transition::end(session, self.approval_notice(session))
            .with_effect(Effect::RecordVote(order.clone()))
    }

    fn on_donate_flow(&self) -> Transition {
        Transition {
            menu: Menu::EnterDonationAmount,
            prev_menu_state: Some(MenuStateKind::DonateFlow),
            reply: Reply::prompt(DONATION_PROMPT),
            effects: Vec::new(),
        }
    }

    fn on_donation_amount(&self, session: &Session, input: &str) -> Transition {
        match parse_donation_amount(input, self.config.donation_ceiling) {
            Ok(amount) => Transition::goto(
                session,
                Menu::ConfirmDonation { amount },
                format!("Confirm Donation:\nAmount: {CURRENCY}{amount}\n\n1. Confirm\n2. Cancel"),
            ),
            Err(DonationError::Invalid) => Transition::stay(session, INVALID_DONATION),
            Err(DonationError::AboveCeiling) => Transition::stay(
                session,
                format!(
                    "Maximum donation amount is {CURRENCY}{}. Please enter a valid amount:",
                    self.config.donation_ceiling
                ),
            ),
        }
    }

    fn on_confirm_donation(&self, session: &Session, amount: Amount, input: &str) -> Transition {
        match input {
            "1" => Transition::end(
                session,
                format!(
                    "Thank you for your donation of {CURRENCY}{amount} to {}! You will receive a prompt to confirm payment.",
                    self.config.campaign
                ),
            )
            .with_effect(Effect::DispatchDonation(amount)),
            "2" => Transition::end(session, DONATION_CANCELLED),
            _ => Transition::stay(session, DONATION_REPROMPT),
        }
    }

    fn approval_notice(&self, session: &Session) -> String {
        format!(
            "You will receive a notification to confirm payment or dial {} to approve payment.",
            session.carrier().approval_dial_code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candidate::Candidate;
    use crate::infrastructure::in_memory::InMemoryCandidateDirectory;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn machine(config: MenuConfig) -> MenuMachine {
        let directory = InMemoryCandidateDirectory::new();
        directory.insert(Candidate::new(1, "Elikem Group", "013"));
        let mut retired = Candidate::new(2, "Retired Troupe", "099");
        retired.is_active = false;
        directory.insert(retired);
        MenuMachine::new(config, Arc::new(directory))
    }

    fn session_at(menu: Menu, prev: Option<MenuStateKind>) -> Session {
        let mut session = Session::open("S1", "233200000001", None, Some("MTN".into()));
        session.menu = menu;
        session.prev_menu_state = prev;
        session
    }

    fn elikem() -> CandidateChoice {
        CandidateChoice {
            id: 1,
            name: "Elikem Group".into(),
            code: "013".into(),
        }
    }

    fn order(votes: u32) -> VoteOrder {
        VoteOrder {
            candidate: elikem(),
            votes,
            amount: Amount::new(Decimal::from(votes)).unwrap(),
        }
    }

    #[test]
    fn test_parse_vote_count() {
        assert_eq!(parse_vote_count("5", 1000), Ok(5));
        assert_eq!(parse_vote_count(" 1000 ", 1000), Ok(1000));
        assert_eq!(parse_vote_count("1001", 1000), Err(VoteCountError::AboveCeiling));
        assert_eq!(
            parse_vote_count("99999999999", 1000),
            Err(VoteCountError::AboveCeiling)
        );
        for bad in ["0007", "0", "abc", "", "-5", "5.0", "1e3", "+5"] {
            assert_eq!(parse_vote_count(bad, 1000), Err(VoteCountError::Invalid), "{bad}");
        }
    }

    #[test]
    fn test_parse_donation_amount() {
        let ceiling = Amount::new(dec!(1000)).unwrap();
        assert_eq!(
            parse_donation_amount("500.50", ceiling).unwrap().value(),
            dec!(500.50)
        );
        assert!(parse_donation_amount("1000", ceiling).is_ok());
        assert_eq!(
            parse_donation_amount("1500", ceiling),
            Err(DonationError::AboveCeiling)
        );
        for bad in ["0", "-1", "abc", "", "1.234"] {
            assert_eq!(parse_donation_amount(bad, ceiling), Err(DonationError::Invalid), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_zero_resets_from_every_state() {
        let machine = machine(MenuConfig::default());
        let states = [
            Menu::MainMenu,
            Menu::EnterGroupCode,
            Menu::EnterVoteCount { candidate: elikem() },
            Menu::ConfirmVotePayment { order: order(2) },
            Menu::EnterMomoPin { order: order(2) },
            Menu::DonateFlow,
            Menu::EnterDonationAmount,
            Menu::ConfirmDonation {
                amount: Amount::new(dec!(10)).unwrap(),
            },
        ];
        for menu in states {
            let session = session_at(menu, Some(MenuStateKind::EnterGroupCode));
            let t = machine.advance(&session, "0").await.unwrap();
            assert_eq!(t.menu, Menu::MainMenu);
            assert_eq!(t.prev_menu_state, None);
            assert!(!t.reply.end);
            assert!(t.effects.is_empty());
            assert!(t.reply.message.starts_with("Welcome to Borbor Carnival 25"));
        }
    }

    #[tokio::test]
    async fn test_main_menu_choices() {
        let machine = machine(MenuConfig::default());
        let session = session_at(Menu::MainMenu, None);

        let vote = machine.advance(&session, "1").await.unwrap();
        assert_eq!(vote.menu, Menu::EnterGroupCode);
        assert_eq!(vote.prev_menu_state, Some(MenuStateKind::MainMenu));
        assert_eq!(vote.reply, Reply::prompt(GROUP_CODE_PROMPT));

        // Donate cascades straight into the amount prompt.
        let donate = machine.advance(&session, "2").await.unwrap();
        assert_eq!(donate.menu, Menu::EnterDonationAmount);
        assert_eq!(donate.prev_menu_state, Some(MenuStateKind::DonateFlow));
        assert_eq!(donate.reply, Reply::prompt(DONATION_PROMPT));

        let other = machine.advance(&session, "7").await.unwrap();
        assert_eq!(other.reply, Reply::end(INVALID_SELECTION));
    }

    #[tokio::test]
    async fn test_group_code_lookup() {
        let machine = machine(MenuConfig::default());
        let session = session_at(Menu::EnterGroupCode, Some(MenuStateKind::MainMenu));

        let found = machine.advance(&session, " 013 ").await.unwrap();
        assert_eq!(found.menu, Menu::EnterVoteCount { candidate: elikem() });
        assert!(found.reply.message.contains("Elikem Group"));
        assert!(!found.reply.end);

        for miss in ["", "999", "099", "13"] {
            let t = machine.advance(&session, miss).await.unwrap();
            assert_eq!(t.menu, Menu::EnterGroupCode, "{miss}");
            assert_eq!(t.reply, Reply::prompt(INVALID_CODE));
        }
    }

    #[tokio::test]
    async fn test_vote_count_validation() {
        let machine = machine(MenuConfig::default());
        let session = session_at(
            Menu::EnterVoteCount { candidate: elikem() },
            Some(MenuStateKind::EnterGroupCode),
        );

        let leading_zero = machine.advance(&session, "0007").await.unwrap();
        let letters = machine.advance(&session, "abc").await.unwrap();
        assert_eq!(leading_zero, letters);
        assert_eq!(letters.reply, Reply::prompt(INVALID_VOTE_COUNT));

        let ceiling = machine.advance(&session, "1001").await.unwrap();
        assert!(ceiling.reply.message.contains("Maximum 1000 votes"));
        assert_eq!(ceiling.menu, session.menu);

        let max = machine.advance(&session, "1000").await.unwrap();
        assert_eq!(max.menu.kind(), MenuStateKind::ConfirmVotePayment);

        let five = machine.advance(&session, "5").await.unwrap();
        assert_eq!(five.menu, Menu::ConfirmVotePayment { order: order(5) });
        assert!(five.reply.message.contains("Votes: 5"));
        assert!(five.reply.message.contains("GHS5"));
    }

    #[tokio::test]
    async fn test_confirm_vote_records_and_dispatches() {
        let machine = machine(MenuConfig::default());
        let session = session_at(
            Menu::ConfirmVotePayment { order: order(5) },
            Some(MenuStateKind::EnterVoteCount),
        );

        let confirmed = machine.advance(&session, "1").await.unwrap();
        assert_eq!(confirmed.effects, vec![Effect::RecordVote(order(5))]);
        assert_eq!(confirmed.menu.kind(), MenuStateKind::EnterMomoPin);
        assert!(!confirmed.reply.end);
        assert!(confirmed.reply.message.contains("*170#"));

        let cancelled = machine.advance(&session, "2").await.unwrap();
        assert_eq!(cancelled.reply, Reply::end(VOTE_CANCELLED));
        assert!(cancelled.effects.is_empty());

        // No re-prompt loop on this screen.
        let other = machine.advance(&session, "3").await.unwrap();
        assert_eq!(other.reply, Reply::end(INVALID_SELECTION));
    }

    #[tokio::test]
    async fn test_dial_code_follows_network() {
        let machine = machine(MenuConfig::default());
        let mut session = session_at(Menu::ConfirmVotePayment { order: order(1) }, None);
        session.network = Some("VODAFONE".into());

        let t = machine.advance(&session, "1").await.unwrap();
        assert!(t.reply.message.contains("*110#"));
    }

    #[tokio::test]
    async fn test_momo_pin_is_bookkeeping_only_by_default() {
        let machine = machine(MenuConfig::default());
        let session = session_at(
            Menu::EnterMomoPin { order: order(5) },
            Some(MenuStateKind::ConfirmVotePayment),
        );

        let t = machine.advance(&session, "1234").await.unwrap();
        assert_eq!(t.reply, Reply::end(PAYMENT_ALREADY_SENT));
        assert!(t.effects.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_pin_capture() {
        let machine = machine(MenuConfig {
            legacy_pin_capture: true,
            ..MenuConfig::default()
        });
        let confirm = session_at(Menu::ConfirmVotePayment { order: order(3) }, None);

        let prompt = machine.advance(&confirm, "1").await.unwrap();
        assert!(prompt.effects.is_empty());
        assert!(prompt.reply.message.contains("PIN"));

        let pin_screen = session_at(prompt.menu, prompt.prev_menu_state);
        let bad = machine.advance(&pin_screen, "12").await.unwrap();
        assert_eq!(bad.reply, Reply::prompt(INVALID_PIN));

        let good = machine.advance(&pin_screen, "1234").await.unwrap();
        assert!(good.reply.end);
        assert_eq!(good.effects, vec![Effect::RecordVote(order(3))]);
    }

    #[tokio::test]
    async fn test_donation_flow() {
        let machine = machine(MenuConfig::default());
        let session = session_at(Menu::EnterDonationAmount, Some(MenuStateKind::DonateFlow));

        let too_much = machine.advance(&session, "1500").await.unwrap();
        assert_eq!(too_much.menu, Menu::EnterDonationAmount);
        assert!(too_much.reply.message.contains("Maximum donation amount is GHS1000"));

        let invalid = machine.advance(&session, "lots").await.unwrap();
        assert_eq!(invalid.reply, Reply::prompt(INVALID_DONATION));

        let ok = machine.advance(&session, "500.50").await.unwrap();
        let amount = Amount::new(dec!(500.50)).unwrap();
        assert_eq!(ok.menu, Menu::ConfirmDonation { amount });
        assert!(ok.reply.message.contains("GHS500.50"));

        let confirm = session_at(ok.menu, ok.prev_menu_state);
        let done = machine.advance(&confirm, "1").await.unwrap();
        assert!(done.reply.end);
        assert_eq!(done.effects, vec![Effect::DispatchDonation(amount)]);

        let again = machine.advance(&confirm, "x").await.unwrap();
        assert_eq!(again.reply, Reply::prompt(DONATION_REPROMPT));

        let cancel = machine.advance(&confirm, "2").await.unwrap();
        assert_eq!(cancel.reply, Reply::end(DONATION_CANCELLED));
    }

    #[tokio::test]
    async fn test_back_navigation() {
        let machine = machine(MenuConfig::default());

        let vote_count = session_at(
            Menu::EnterVoteCount { candidate: elikem() },
            Some(MenuStateKind::EnterGroupCode),
        );
        let t = machine.advance(&vote_count, "B").await.unwrap();
        assert_eq!(t.menu, Menu::EnterGroupCode);
        assert_eq!(t.reply, Reply::prompt(GROUP_CODE_PROMPT));

        let confirm = session_at(
            Menu::ConfirmVotePayment { order: order(1) },
            Some(MenuStateKind::EnterVoteCount),
        );
        let t = machine.advance(&confirm, "b").await.unwrap();
        assert_eq!(t.menu, Menu::MainMenu);
        assert!(t.reply.message.starts_with("Welcome"));

        let fresh = session_at(Menu::EnterGroupCode, None);
        let t = machine.advance(&fresh, "b").await.unwrap();
        assert_eq!(t.menu, Menu::MainMenu);
    }
}
