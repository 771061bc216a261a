use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::errors::WalletError;
use crate::keyring::AccountInfo;
use crate::session::SessionSnapshot;

/// Where a message came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Popup or background script of the extension itself.
    #[default]
    Extension,
    /// A web page talking through the content script. Untrusted.
    Page,
}

/// Inbound message, tagged by `type`.
///
/// Password fields are plain strings only until the service wraps them in a
/// `SecretString`; `Debug` prints the message kind and nothing else.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetState,
    UnlockWallet {
        password: String,
    },
    LockWallet,
    SwitchNetwork {
        network: String,
    },
    RequestAccounts,
    CreateWallet {
        password: String,
        #[serde(default, rename = "entropyBits")]
        entropy_bits: Option<usize>,
    },
    ImportWallet {
        mnemonic: String,
        password: String,
    },
    GetAccounts,
    SelectAccount {
        address: String,
        password: String,
    },
    AddAccount {
        password: String,
    },
    ChangePassword {
        #[serde(rename = "currentPassword")]
        current_password: String,
        #[serde(rename = "newPassword")]
        new_password: String,
    },
    RevealMnemonic {
        password: String,
    },
    SetSessionTimeout {
        minutes: u32,
    },
    ResetWallet {
        #[serde(default)]
        confirm: bool,
    },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetState => "GET_STATE",
            Request::UnlockWallet { .. } => "UNLOCK_WALLET",
            Request::LockWallet => "LOCK_WALLET",
            Request::SwitchNetwork { .. } => "SWITCH_NETWORK",
            Request::RequestAccounts => "REQUEST_ACCOUNTS",
            Request::CreateWallet { .. } => "CREATE_WALLET",
            Request::ImportWallet { .. } => "IMPORT_WALLET",
            Request::GetAccounts => "GET_ACCOUNTS",
            Request::SelectAccount { .. } => "SELECT_ACCOUNT",
            Request::AddAccount { .. } => "ADD_ACCOUNT",
            Request::ChangePassword { .. } => "CHANGE_PASSWORD",
            Request::RevealMnemonic { .. } => "REVEAL_MNEMONIC",
            Request::SetSessionTimeout { .. } => "SET_SESSION_TIMEOUT",
            Request::ResetWallet { .. } => "RESET_WALLET",
        }
    }

    /// Web pages may only ask for accounts and the public state.
    pub fn allowed_from_page(&self) -> bool {
        matches!(self, Request::RequestAccounts | Request::GetState)
    }

    /// Whether this request keeps an unlocked session alive. Page traffic
    /// never does; see [`crate::BackgroundService::handle`].
    pub fn counts_as_activity(&self) -> bool {
        !matches!(self, Request::GetState)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({})", self.kind())
    }
}

/// A request as it arrives over the native-messaging pipe.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub origin: Origin,
    #[serde(flatten)]
    pub request: Request,
}

/// Recovery phrase on its way to the UI.
#[derive(Clone)]
pub struct RevealedPhrase(Zeroizing<String>);

impl RevealedPhrase {
    pub fn new(phrase: Zeroizing<String>) -> Self {
        Self(phrase)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Serialize for RevealedPhrase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Debug for RevealedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RevealedPhrase([redacted])")
    }
}

/// Outbound message. The JSON shape carries no tag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    State {
        success: bool,
        state: SessionSnapshot,
    },
    Created {
        success: bool,
        address: String,
        mnemonic: RevealedPhrase,
    },
    Imported {
        success: bool,
        address: String,
    },
    AccountList {
        success: bool,
        accounts: Vec<AccountInfo>,
        #[serde(rename = "currentAddress")]
        current_address: String,
    },
    AccountAdded {
        success: bool,
        account: AccountInfo,
    },
    Mnemonic {
        success: bool,
        mnemonic: RevealedPhrase,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(rename = "offerReset", skip_serializing_if = "Option::is_none")]
        offer_reset: Option<bool>,
    },
    /// Page-facing account list, addresses only.
    Accounts {
        accounts: Vec<String>,
    },
    /// Page-facing refusal.
    Denied {
        error: String,
    },
    Ack {
        success: bool,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { success: true }
    }

    pub fn failure(err: &WalletError) -> Self {
        Response::Failure {
            success: false,
            error: err.user_message(),
            offer_reset: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Response::Denied {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::State { success, .. }
            | Response::Created { success, .. }
            | Response::Imported { success, .. }
            | Response::AccountList { success, .. }
            | Response::AccountAdded { success, .. }
            | Response::Mnemonic { success, .. }
            | Response::Failure { success, .. }
            | Response::Ack { success } => *success,
            Response::Accounts { .. } => true,
            Response::Denied { .. } => false,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Failure { error, .. } | Response::Denied { error } => Some(error),
            _ => None,
        }
    }
}
