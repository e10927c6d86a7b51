//! Payment transaction envelopes
//!
//! Builds a single-operation payment transaction, signs it for a network and
//! returns the base64 XDR envelope the gateway accepts.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    AccountId, AlphaNum12, AlphaNum4, Asset, AssetCode12, AssetCode4, DecoratedSignature, Hash,
    Limits, Memo, MuxedAccount, Operation, OperationBody, PaymentOp, Preconditions, PublicKey,
    SequenceNumber, Signature, SignatureHint, TimeBounds, TimePoint, Transaction,
    TransactionEnvelope, TransactionExt, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV1Envelope, Uint256, WriteXdr,
};

use crate::error::{Error, Result};
use crate::wallet::amount::to_stroops;
use crate::wallet::{Network, PaymentIntent};

use super::keys::decode_public_key;

/// A signed envelope ready for submission
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    /// Base64 XDR
    pub xdr: String,

    /// Hex transaction hash
    pub hash: String,
}

/// Parameters that come from the ledger rather than the user
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParams {
    pub network: Network,

    /// Sequence number to use (current account sequence + 1)
    pub sequence: i64,

    /// Fee per operation in stroops
    pub fee: u32,

    /// Unix time after which the transaction is invalid
    pub valid_until: u64,
}

fn xdr_error(e: stellar_xdr::curr::Error) -> Error {
    Error::TransactionFailed(format!("Transaction failed: {}", e))
}

fn account_id(bytes: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes)))
}

fn asset_for(intent: &PaymentIntent) -> Result<Asset> {
    let (code, issuer) = match (&intent.asset_code, &intent.asset_issuer) {
        (Some(code), Some(issuer)) => (code, issuer),
        (None, None) => return Ok(Asset::Native),
        _ => return Err(Error::AssetPairingError),
    };

    let issuer = account_id(decode_public_key(issuer)?);
    let bytes = code.as_bytes();

    match bytes.len() {
        1..=4 => {
            let mut padded = [0u8; 4];
            padded[..bytes.len()].copy_from_slice(bytes);
            Ok(Asset::CreditAlphanum4(AlphaNum4 {
                asset_code: AssetCode4(padded),
                issuer,
            }))
        }
        5..=12 => {
            let mut padded = [0u8; 12];
            padded[..bytes.len()].copy_from_slice(bytes);
            Ok(Asset::CreditAlphanum12(AlphaNum12 {
                asset_code: AssetCode12(padded),
                issuer,
            }))
        }
        _ => Err(Error::TransactionFailed(format!(
            "Transaction failed: invalid asset code {:?}",
            code
        ))),
    }
}

fn memo_for(intent: &PaymentIntent) -> Result<Memo> {
    match intent.memo.as_deref() {
        None | Some("") => Ok(Memo::None),
        Some(text) => text
            .as_bytes()
            .to_vec()
            .try_into()
            .map(Memo::Text)
            .map_err(|_| {
                Error::TransactionFailed("Transaction failed: memo exceeds 28 bytes".to_string())
            }),
    }
}

/// Hash that signers sign: sha256(network id || envelope type || tx)
fn signature_base_hash(tx: &Transaction, network: Network) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(Sha256::digest(network.passphrase().as_bytes()).into()),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };

    let bytes = payload.to_xdr(Limits::none()).map_err(xdr_error)?;
    Ok(Sha256::digest(bytes).into())
}

/// Build and sign a payment envelope
pub fn build_payment(
    signing_key: &SigningKey,
    intent: &PaymentIntent,
    params: EnvelopeParams,
) -> Result<SignedEnvelope> {
    let source = signing_key.verifying_key().to_bytes();
    let destination = decode_public_key(&intent.destination)?;

    let operation = Operation {
        source_account: None,
        body: OperationBody::Payment(PaymentOp {
            destination: MuxedAccount::Ed25519(Uint256(destination)),
            asset: asset_for(intent)?,
            amount: to_stroops(&intent.amount)?,
        }),
    };

    let tx = Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(source)),
        fee: params.fee,
        seq_num: SequenceNumber(params.sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(params.valid_until),
        }),
        memo: memo_for(intent)?,
        operations: vec![operation].try_into().map_err(xdr_error)?,
        ext: TransactionExt::V0,
    };

    let hash = signature_base_hash(&tx, params.network)?;
    let signature = signing_key.sign(&hash);

    let mut hint = [0u8; 4];
    hint.copy_from_slice(&source[28..]);

    let decorated = DecoratedSignature {
        hint: SignatureHint(hint),
        signature: Signature(signature.to_bytes().to_vec().try_into().map_err(xdr_error)?),
    };

    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: vec![decorated].try_into().map_err(xdr_error)?,
    });

    let bytes = envelope.to_xdr(Limits::none()).map_err(xdr_error)?;

    Ok(SignedEnvelope {
        xdr: BASE64.encode(bytes),
        hash: hash.iter().map(|b| format!("{:02x}", b)).collect(),
    })
}
