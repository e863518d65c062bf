//! Provision local members and tokens against the shared token store.
//!
//! Usage:
//!   debate-setup <username>             register a member and print a token
//!   debate-setup --member <member_id>   mint another token for a member
//!
//! Reads DATABASE_URL and REDIS_URL the same way the server does.

use std::path::Path;

use debate_api::auth::provision;
use debate_api::config::Config;
use debate_api::db::kv::RedisStore;

enum Command {
    Register(String),
    Token(String),
}

fn parse_args(args: &[String]) -> Option<Command> {
    match args {
        [flag, member_id] if flag == "--member" => Some(Command::Token(member_id.clone())),
        [username] if !username.starts_with("--") => Some(Command::Register(username.clone())),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse_args(&args) else {
        eprintln!("usage: debate-setup <username> | debate-setup --member <member_id>");
        std::process::exit(2);
    };

    let config = Config::from_env();
    let db = debate_api::db::pool::connect(&config.database_url).expect("failed to build pool");
    let mut conn = db.get().await.expect("failed to connect to database");
    let kv = RedisStore::connect(&config.redis_url)
        .await
        .expect("failed to connect to redis");

    let result = match command {
        Command::Register(username) => provision::provision_member(&mut conn, &kv, &username)
            .await
            .map(|(member, token)| (member.id, token)),
        Command::Token(member_id) => provision::issue_token(&mut conn, &kv, &member_id)
            .await
            .map(|token| (member_id, token)),
    };

    match result {
        Ok((member_id, token)) => {
            println!("MEMBER_ID={member_id}");
            println!("TOKEN={token}");
        }
        Err(err) => {
            eprintln!("Provisioning failed: {}", err.message);
            std::process::exit(1);
        }
    }
}
