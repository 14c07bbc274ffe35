//! Derive a shielded identity from a fixed dev signature and print its
//! public material.
//!
//! Run with: cargo run --example gen_dev_account -p zdoge-wallet

use zdoge_crypto::memo_public_key;
use zdoge_wallet::identity_message;
use zdoge_wallet::WalletIdentity;

fn main() {
    // A stand-in for a real wallet signature -- in production this comes
    // from the user's signer over `identity_message`. DO NOT USE IN
    // PRODUCTION.
    let wallet_address = "0x000000000000000000000000000000000000Af";
    let message = identity_message(wallet_address);
    let dev_signature = format!("dev-signature-over:{message}").into_bytes();

    let identity = WalletIdentity::from_signature(dev_signature);
    let shielded_address = identity.shielded_address();
    let memo_key = memo_public_key(&identity.identity.viewing_key);

    println!("=== Dev shielded identity ===\n");
    println!("Wallet address:     {wallet_address}");
    println!("Identity message:   {message}");
    println!("Shielded address:   {shielded_address}");
    println!("Memo public key:    0x{}", hex::encode(memo_key));
}
