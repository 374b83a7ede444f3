//! Command-line demo wrapper over the magic-link library: issues and
//! verifies tokens against a key supplied as base64. Not a new surface with
//! its own semantics, and it carries no server.

use std::process::ExitCode;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use magic_link::claims::app_keys;
use magic_link::{
    BlackholeNonceStore, Claims, CreateOptions, Key, KeySet, LinkBuilder, RequestContext,
    SystemClock, Verifier, VerifyOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Issue and verify magic-link tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a new token.
    Issue {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        key_id: String,
        #[arg(long)]
        secret_b64: String,
        #[arg(long)]
        aud: Option<String>,
        #[arg(long, default_value_t = 900)]
        ttl: i64,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long, default_value_t = true)]
        one_time: bool,
        #[arg(long)]
        path_bind: Option<String>,
        #[arg(long)]
        return_to: Option<String>,
    },
    /// Verify a token and print its claims.
    Verify {
        #[arg(long)]
        token: String,
        #[arg(long)]
        key_id: String,
        #[arg(long)]
        secret_b64: String,
        #[arg(long)]
        expected_aud: Option<String>,
        #[arg(long)]
        expected_path: Option<String>,
        #[arg(long)]
        expected_host: Option<String>,
        #[arg(long, default_value_t = false)]
        require_one_time: bool,
    },
}

fn load_keys(key_id: &str, secret_b64: &str) -> Result<KeySet, String> {
    let secret = STANDARD
        .decode(secret_b64)
        .map_err(|err| format!("invalid base64 secret: {err}"))?;
    let key = Key::new(key_id.to_string(), secret, 1, None)
        .map_err(|err| format!("invalid key material: {err}"))?;
    let mut keys = KeySet::new();
    keys.add(key);
    Ok(keys)
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Command::Issue {
            subject,
            key_id,
            secret_b64,
            aud,
            ttl,
            base_url,
            one_time,
            path_bind,
            return_to,
        } => {
            let keys = load_keys(&key_id, &secret_b64)?;
            let clock = SystemClock;
            let builder = LinkBuilder::new(&keys, &clock);
            let options = CreateOptions {
                aud,
                ttl_seconds: Some(ttl),
                one_time,
                path_bind,
                return_to,
                ..Default::default()
            };
            let token = builder
                .issue(&subject, &options)
                .map_err(|err| format!("issue failed: {err}"))?;
            match base_url {
                Some(base) => {
                    let url = LinkBuilder::<SystemClock>::create_url(&base, &token, "ml")
                        .map_err(|err| format!("url assembly failed: {err}"))?;
                    println!("{url}");
                }
                None => println!("{token}"),
            }
            Ok(())
        }
        Command::Verify {
            token,
            key_id,
            secret_b64,
            expected_aud,
            expected_path,
            expected_host,
            require_one_time,
        } => {
            let keys = load_keys(&key_id, &secret_b64)?;
            let clock = SystemClock;
            let nonce_store = BlackholeNonceStore;
            let verifier = Verifier::new(&keys, &clock, &nonce_store);
            let options = VerifyOptions {
                expected_aud,
                expected_path,
                expected_host,
                require_one_time,
                ..Default::default()
            };
            match verifier.verify(&token, &options, &RequestContext::default()) {
                Ok(claims) => {
                    println!("{}", render_claims(&claims));
                    Ok(())
                }
                Err(reason) => Err(format!("verification failed: {reason}")),
            }
        }
    }
}

fn render_claims(claims: &Claims) -> String {
    let bind_path = claims.get_app_str(app_keys::BIND_PATH).unwrap_or("-");
    let return_to = claims.get_app_str(app_keys::RETURN_TO).unwrap_or("-");
    format!(
        "sub={} iat={} exp={} bind.path={} return_to={}",
        claims.sub, claims.iat, claims.exp, bind_path, return_to
    )
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
