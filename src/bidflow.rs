// Bid submission pipeline against a simulated auction backend
// Exercises the full chaining vocabulary the way a wallet-facing form would

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::result::Outcome;
use crate::result_async::{self, OutcomeAsync};

/// Bid as typed into the form; the amount may still be missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidForm {
    pub bidder: String,
    pub lot_id: String,
    pub amount_lovelace: Option<u64>,
}

impl FromStr for BidForm {
    type Err = anyhow::Error;

    /// `bidder:lot:amount`, amount may be left empty
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (Some(bidder), Some(lot_id), Some(amount)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(anyhow!("Invalid bid '{s}'. Expected bidder:lot:amount"));
        };
        if bidder.is_empty() || lot_id.is_empty() {
            return Err(anyhow!("Invalid bid '{s}'. Bidder and lot must be non-empty"));
        }
        let amount_lovelace = match amount.trim() {
            "" => None,
            n => Some(
                n.parse::<u64>()
                    .map_err(|e| anyhow!("Invalid amount in bid '{s}': {e}"))?,
            ),
        };
        Ok(BidForm {
            bidder: bidder.to_string(),
            lot_id: lot_id.to_string(),
            amount_lovelace,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidBid {
    pub bidder: String,
    pub lot_id: String,
    pub amount_lovelace: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lot_id: String,
    pub reserve_lovelace: u64,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedBid {
    pub bid: ValidBid,
    pub witness: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_id: String,
    pub bidder: String,
    pub lot_id: String,
    pub amount_lovelace: u64,
}

/// Bindings carried once the quote is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quoted {
    pub bid: ValidBid,
    pub quote: Quote,
}

// Step errors. Each one converts into `BidError`.

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkFault {
    pub endpoint: &'static str,
    pub lot_id: String,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotClosed {
    pub lot_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletRejection {
    pub bidder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BidError {
    MissingAmount { lot_id: String },
    BelowMinimum { lot_id: String, minimum_lovelace: u64 },
    BelowReserve,
    LotClosed(LotClosed),
    WalletRejected(WalletRejection),
    Network(NetworkFault),
}

impl fmt::Display for BidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidError::MissingAmount { lot_id } => write!(f, "no amount entered for lot {lot_id}"),
            BidError::BelowMinimum {
                lot_id,
                minimum_lovelace,
            } => write!(
                f,
                "bid on lot {lot_id} is below the minimum of {minimum_lovelace} lovelace"
            ),
            BidError::BelowReserve => write!(f, "bid does not meet the lot reserve"),
            BidError::LotClosed(e) => write!(f, "lot {} is closed", e.lot_id),
            BidError::WalletRejected(e) => write!(f, "wallet of {} refused to sign", e.bidder),
            BidError::Network(e) => write!(
                f,
                "{} unreachable for lot {} (attempt {})",
                e.endpoint,
                e.lot_id,
                e.attempt + 1
            ),
        }
    }
}

impl std::error::Error for BidError {}

impl From<LotClosed> for BidError {
    fn from(e: LotClosed) -> Self {
        BidError::LotClosed(e)
    }
}

impl From<WalletRejection> for BidError {
    fn from(e: WalletRejection) -> Self {
        BidError::WalletRejected(e)
    }
}

impl From<NetworkFault> for BidError {
    fn from(e: NetworkFault) -> Self {
        BidError::Network(e)
    }
}

/// How a batch of bids is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMode {
    /// One after another, stop at the first failure
    Seq,
    /// All at once, report every failure
    Par,
    /// All at once, keep whatever went through
    BestEffort,
}

impl FromStr for SubmitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "seq" => Ok(SubmitMode::Seq),
            "par" => Ok(SubmitMode::Par),
            "best-effort" | "besteffort" => Ok(SubmitMode::BestEffort),
            _ => anyhow::bail!(
                "Invalid submit mode: {}. Must be 'seq', 'par', or 'best-effort'",
                s
            ),
        }
    }
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitMode::Seq => write!(f, "seq"),
            SubmitMode::Par => write!(f, "par"),
            SubmitMode::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Simulated auction backend and wallet
#[derive(Debug)]
pub struct Backend {
    latency: Duration,
    min_bid_lovelace: u64,
    reserve_lovelace: u64,
    closed_lots: HashSet<String>,
    offline_lots: HashSet<String>,
    rejecting_bidders: HashSet<String>,
    flaky_network: bool,
    submissions: AtomicU64,
}

impl Backend {
    pub fn from_config(config: &Config) -> Self {
        Backend {
            latency: Duration::from_millis(config.latency_ms()),
            min_bid_lovelace: config.min_bid_lovelace(),
            reserve_lovelace: config.reserve_lovelace(),
            closed_lots: config.closed_lots().iter().cloned().collect(),
            offline_lots: config.offline_lots().iter().cloned().collect(),
            rejecting_bidders: config.rejecting_bidders().iter().cloned().collect(),
            flaky_network: config.flaky_network(),
            submissions: AtomicU64::new(0),
        }
    }

    /// Number of bids accepted so far
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    pub async fn fetch_quote(&self, lot_id: &str) -> Result<Quote, NetworkFault> {
        tokio::time::sleep(self.latency).await;
        if self.offline_lots.contains(lot_id) {
            return Err(NetworkFault {
                endpoint: "quote",
                lot_id: lot_id.to_string(),
                attempt: 0,
            });
        }
        Ok(Quote {
            lot_id: lot_id.to_string(),
            reserve_lovelace: self.reserve_lovelace,
            open: !self.closed_lots.contains(lot_id),
        })
    }

    /// Wallet signature; synchronous like a CIP-30 `signData` prompt answered up front
    pub fn sign(&self, bid: &ValidBid) -> Outcome<SignedBid, WalletRejection> {
        Outcome::success(bid.clone()).fail_if(
            |bid, _| self.rejecting_bidders.contains(&bid.bidder),
            WalletRejection {
                bidder: bid.bidder.clone(),
            },
        )
        .chain(|bid, _| SignedBid {
            witness: format!("ed25519:{}:{}:{}", bid.bidder, bid.lot_id, bid.amount_lovelace),
            bid,
        })
    }

    pub async fn submit(&self, signed: SignedBid, attempt: u32) -> Result<Receipt, NetworkFault> {
        tokio::time::sleep(self.latency).await;
        if self.flaky_network && attempt == 0 {
            return Err(NetworkFault {
                endpoint: "submit",
                lot_id: signed.bid.lot_id,
                attempt,
            });
        }
        let seq = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Receipt {
            tx_id: format!("tx-{}-{seq:04}", signed.bid.lot_id),
            bidder: signed.bid.bidder,
            lot_id: signed.bid.lot_id,
            amount_lovelace: signed.bid.amount_lovelace,
        })
    }
}

fn validate(form: BidForm, minimum_lovelace: u64) -> Outcome<ValidBid, BidError> {
    let BidForm {
        bidder,
        lot_id,
        amount_lovelace,
    } = form;
    Outcome::from_nullable(
        amount_lovelace,
        BidError::MissingAmount {
            lot_id: lot_id.clone(),
        },
    )
    .fail_if(
        |amount, _| *amount < minimum_lovelace,
        BidError::BelowMinimum {
            lot_id: lot_id.clone(),
            minimum_lovelace,
        },
    )
    .chain(|amount_lovelace, _| ValidBid {
        bidder,
        lot_id,
        amount_lovelace,
    })
}

fn ensure_open(quote: Quote) -> Outcome<Quote, LotClosed> {
    if quote.open {
        Outcome::success(quote)
    } else {
        Outcome::failure(LotClosed {
            lot_id: quote.lot_id,
        })
    }
}

fn submit_once(backend: Arc<Backend>, signed: SignedBid, attempt: u32) -> OutcomeAsync<Receipt, BidError> {
    OutcomeAsync::from_future(
        move || {
            let backend = Arc::clone(&backend);
            let signed = signed.clone();
            async move { backend.submit(signed, attempt).await }
        },
        BidError::from,
    )
}

/// Submits once more when the first attempt hit the network
fn submit_with_retry(backend: Arc<Backend>, signed: SignedBid) -> OutcomeAsync<Receipt, BidError> {
    submit_once(Arc::clone(&backend), signed.clone(), 0).chain_error_ra(move |error| match error {
        BidError::Network(fault) => {
            log::warn!("retrying submission for lot {}", fault.lot_id);
            submit_once(Arc::clone(&backend), signed.clone(), fault.attempt + 1)
        }
        other => OutcomeAsync::failure(other),
    })
}

/// Validate, quote, sign, submit. Nothing runs until the result is run.
pub fn submit_bid(form: BidForm, backend: Arc<Backend>) -> OutcomeAsync<Receipt, BidError, Quoted> {
    let min_bid_lovelace = backend.min_bid_lovelace;
    let quotes = Arc::clone(&backend);
    let wallet = Arc::clone(&backend);
    OutcomeAsync::<_, BidError>::success(form)
        .chain_r_as(
            move |form, _| validate(form, min_bid_lovelace),
            |(), bid| bid.clone(),
        )
        .chain_p_as(
            move |bid, _| {
                let quotes = Arc::clone(&quotes);
                async move { quotes.fetch_quote(&bid.lot_id).await }
            },
            BidError::from,
            |bid, quote| Quoted {
                bid,
                quote: quote.clone(),
            },
        )
        .chain_r(|quote, _| ensure_open(quote))
        .fail_if(
            |quote, ctx| ctx.bid.amount_lovelace < quote.reserve_lovelace,
            BidError::BelowReserve,
        )
        .chain_r(move |_, ctx| wallet.sign(&ctx.bid))
        .chain_ra(move |signed, _| submit_with_retry(Arc::clone(&backend), signed))
}

/// Submits every form according to `mode`
pub fn submit_all(
    forms: Vec<BidForm>,
    backend: Arc<Backend>,
    mode: SubmitMode,
) -> OutcomeAsync<Vec<Receipt>, Vec<BidError>> {
    let ops = forms
        .into_iter()
        .map(|form| submit_bid(form, Arc::clone(&backend)));
    match mode {
        SubmitMode::Seq => result_async::combine_array_seq(ops).chain_error(|e| vec![e]),
        SubmitMode::Par => result_async::combine_array_par(ops),
        SubmitMode::BestEffort => result_async::combine_array_par_ignore_failures(ops).lift_error(),
    }
}

/// Confirmation or error text for a finished batch
pub fn alert(outcome: Outcome<Vec<Receipt>, Vec<BidError>>) -> String {
    outcome.match_with(
        |receipts, _| {
            let ids: Vec<&str> = receipts.iter().map(|r| r.tx_id.as_str()).collect();
            format!("✅ {} bid(s) confirmed: {}", receipts.len(), ids.join(", "))
        },
        |errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            format!("❌ {} bid(s) failed: {}", errors.len(), reasons.join("; "))
        },
    )
}
