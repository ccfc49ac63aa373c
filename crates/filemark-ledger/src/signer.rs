//! secp256k1 signing of EIP-1559 (type `0x02`) transactions.
//!
//! The signing payload is `0x02 || rlp([chain_id, nonce, max_priority_fee,
//! max_fee, gas_limit, to, value, data, access_list])`, and the signed
//! transaction appends `[y_parity, r, s]` to the same list.

use k256::ecdsa::SigningKey;
use rlp::RlpStream;

use filemark_contracts::{SigningCredential, TrackerError, TrackerResult};
use filemark_core::keccak256;

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

const EIP1559_TX_TYPE: u8 = 0x02;

/// An unsigned EIP-1559 contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: [u8; ADDRESS_LEN],
    pub value: u128,
    pub data: Vec<u8>,
}

impl Eip1559Transaction {
    /// The bytes whose Keccak-256 is signed.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        typed(stream)
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        let to: &[u8] = &self.to;
        let data: &[u8] = &self.data;
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        stream.append(&to);
        stream.append(&self.value);
        stream.append(&data);
        // Empty access list.
        stream.append_raw(&[0xc0], 1);
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// A signing key and the account address it controls.
pub struct LocalSigner {
    key: SigningKey,
    address: [u8; ADDRESS_LEN],
}

impl LocalSigner {
    /// Build a signer from `credential`.
    ///
    /// Returns `InvalidCredential` if the secret is not a valid secp256k1
    /// scalar.
    pub fn from_credential(credential: &SigningCredential) -> TrackerResult<Self> {
        let key = SigningKey::from_slice(credential.secret_bytes()).map_err(|e| {
            TrackerError::InvalidCredential {
                reason: format!("secret key is not a valid secp256k1 scalar: {e}"),
            }
        })?;
        let address = address_of(&key)?;
        Ok(Self { key, address })
    }

    pub fn address(&self) -> [u8; ADDRESS_LEN] {
        self.address
    }

    /// The `0x`-prefixed lowercase account address.
    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Sign `tx` and produce its raw encoding and hash.
    pub fn sign(&self, tx: &Eip1559Transaction) -> TrackerResult<SignedTransaction> {
        let sighash = keccak256(&tx.signing_payload());
        let (signature, recovery_id) =
            self.key
                .sign_prehash_recoverable(&sighash)
                .map_err(|e| TrackerError::InvalidCredential {
                    reason: format!("signing failed: {e}"),
                })?;

        let bytes = signature.to_bytes();
        let r = trim_leading_zeros(&bytes[..32]);
        let s = trim_leading_zeros(&bytes[32..]);

        let mut stream = RlpStream::new_list(12);
        tx.append_fields(&mut stream);
        stream.append(&u64::from(recovery_id.is_y_odd()));
        stream.append(&r);
        stream.append(&s);

        let raw = typed(stream);
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash })
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address_hex())
            .finish_non_exhaustive()
    }
}

/// Account address of `key`: the last 20 bytes of the Keccak-256 of the
/// uncompressed public key without its `0x04` tag.
fn address_of(key: &SigningKey) -> TrackerResult<[u8; ADDRESS_LEN]> {
    let point = key.verifying_key().to_encoded_point(false);
    let bytes = point.as_bytes();
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(TrackerError::InvalidCredential {
            reason: "unexpected public key encoding".to_string(),
        });
    }
    let digest = keccak256(&bytes[1..]);
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&digest[12..]);
    Ok(address)
}

fn typed(stream: RlpStream) -> Vec<u8> {
    let body = stream.out();
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(&body);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Parse a `0x`-prefixed 20-byte account address.
pub fn parse_address(s: &str) -> TrackerResult<[u8; ADDRESS_LEN]> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| TrackerError::InvalidInput {
            reason: format!("address '{trimmed}' must start with 0x"),
        })?;
    let mut address = [0u8; ADDRESS_LEN];
    hex::decode_to_slice(digits, &mut address).map_err(|e| TrackerError::InvalidInput {
        reason: format!("address '{trimmed}' is not 20 hex bytes: {e}"),
    })?;
    Ok(address)
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
    use rlp::Rlp;

    use super::*;

    // Well-known development account #0 of local EVM nodes.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn dev_signer() -> LocalSigner {
        LocalSigner::from_credential(&SigningCredential::from_hex(DEV_KEY).unwrap()).unwrap()
    }

    fn sample_tx() -> Eip1559Transaction {
        Eip1559Transaction {
            chain_id: 31337,
            nonce: 3,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 3_000_000_000,
            gas_limit: 120_000,
            to: [0x5F; ADDRESS_LEN],
            value: 0,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    fn field<'a>(rlp: &'a Rlp<'a>, index: usize) -> &'a [u8] {
        rlp.at(index).unwrap().data().unwrap()
    }

    #[test]
    fn derives_known_dev_address() {
        assert_eq!(dev_signer().address_hex(), DEV_ADDRESS);
    }

    #[test]
    fn rejects_key_above_curve_order() {
        let credential = SigningCredential::from_bytes([0xFF; 32]).unwrap();
        assert!(matches!(
            LocalSigner::from_credential(&credential),
            Err(TrackerError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn debug_does_not_print_key() {
        let rendered = format!("{:?}", dev_signer());
        assert!(rendered.contains(DEV_ADDRESS));
        assert!(!rendered.contains("ac0974"));
    }

    #[test]
    fn signed_transaction_has_typed_envelope() {
        let signed = dev_signer().sign(&sample_tx()).unwrap();

        assert_eq!(signed.raw[0], EIP1559_TX_TYPE);
        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert!(signed.raw_hex().starts_with("0x02"));
        assert_eq!(signed.hash_hex().len(), 66);

        let rlp = Rlp::new(&signed.raw[1..]);
        assert!(rlp.is_list());
        assert_eq!(rlp.item_count().unwrap(), 12);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 31337);
        assert_eq!(rlp.val_at::<u64>(1).unwrap(), 3);
        assert_eq!(field(&rlp, 5), &[0x5F; ADDRESS_LEN]);
        assert_eq!(field(&rlp, 7), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn signature_recovers_signer_address() {
        let tx = sample_tx();
        let signed = dev_signer().sign(&tx).unwrap();
        let rlp = Rlp::new(&signed.raw[1..]);

        let parity = rlp.val_at::<u8>(9).unwrap();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        let (r_raw, s_raw) = (field(&rlp, 10), field(&rlp, 11));
        r[32 - r_raw.len()..].copy_from_slice(r_raw);
        s[32 - s_raw.len()..].copy_from_slice(s_raw);

        let signature = Signature::from_scalars(r, s).unwrap();
        let recovery_id = RecoveryId::from_byte(parity).unwrap();
        let sighash = keccak256(&tx.signing_payload());
        let recovered =
            VerifyingKey::recover_from_prehash(&sighash, &signature, recovery_id).unwrap();

        let point = recovered.to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        assert_eq!(format!("0x{}", hex::encode(&digest[12..])), DEV_ADDRESS);
    }

    #[test]
    fn parses_addresses() {
        assert_eq!(parse_address(DEV_ADDRESS).unwrap(), dev_signer().address());
        assert!(matches!(
            parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            Err(TrackerError::InvalidInput { .. })
        ));
        assert!(matches!(parse_address("0x1234"), Err(TrackerError::InvalidInput { .. })));
    }

    #[test]
    fn trims_only_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), &[1, 0]);
        assert!(trim_leading_zeros(&[0, 0]).is_empty());
    }
}
