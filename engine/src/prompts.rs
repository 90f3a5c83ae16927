//! User-facing text fragments.

use ballot_types::{VoteTally, WalletAddress};

pub(crate) const WELCOME: &str = "=== Welcome to DAO Voting System ===\n\n\
     Please enter your wallet address to continue:\n\n\
     (Note: It should be a 42-character ID starting with '0x'. \
     Ensure you have it ready to proceed with voting.)";

pub(crate) const WALLET_REJECTED: &str =
    "Invalid wallet address format. Please provide a valid Ethereum address.\n\
     Please enter your wallet address:";

pub(crate) const NEW_WALLET: &str = "Please enter your new wallet address:";

pub(crate) const ASK_PROPOSAL_ID: &str = "Enter proposal ID:";

pub(crate) const ASK_VOTE: &str = "Enter your vote (for/against/abstain):";

pub(crate) const FAREWELL: &str = "Thank you for using the DAO Voting System!";

pub(crate) const NO_WALLET: &str = "No user initialized. Please set wallet address first.";

pub(crate) const NO_HISTORY: &str = "No voting history found.";

pub(crate) fn menu() -> String {
    [
        "\n=== DAO Voting System ===",
        "1. View Proposals and Analysis",
        "2. Submit Vote",
        "3. View All Voting History",
        "4. Switch Wallet",
        "5. Exit",
        "\nEnter your choice (1-5): ",
    ]
    .join("\n")
}

pub(crate) fn wallet_accepted(wallet: &WalletAddress) -> String {
    format!("Successfully initialized wallet: {wallet} \n\n{}", menu())
}

pub(crate) fn tally_section(tally: &VoteTally) -> String {
    format!(
        "\nCurrent Voting Statistics:\n\n\
         Total 'For' votes: {}\n\n\
         Total 'Against' votes: {}\n\n\
         Total 'Abstain' votes: {}\n",
        tally.for_votes, tally.against_votes, tally.abstain_votes
    )
}
