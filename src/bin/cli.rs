use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use clap::Subcommand;
use clap_serde_derive::ClapSerde;

use shachiku_ai::config::{Config, DEFAULT_CONFIG_FILE};
use shachiku_ai::inference::client::ModelClient;
use shachiku_ai::inference::model_config::GenerationRequest;
use shachiku_ai::inference::models::causal_lm::CausalLmModel;
use shachiku_ai::service::excuse::ExcuseService;
use shachiku_ai::service::reply::ReplyService;
use shachiku_ai::task::reply::{ReplyMessage, ReplyMission, ReplyRequest, ReplySettings};
use shachiku_ai::telemetry::init_telemetry;

/// Runs a single generation against the configured model and prints the full result
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    #[command(subcommand)]
    cmd: Commands,

    /// Configuration options
    #[command(flatten)]
    opt_config: <Config as ClapSerde>::Opt,
}

#[derive(Subcommand)]
enum Commands {
    Excuse {
        /// Question that needs an excuse
        #[clap(short, long)]
        question: String,

        #[clap(long, default_value_t = 512)]
        max_length: usize,

        #[clap(long, default_value_t = 0.7)]
        temperature: f64,

        #[clap(long, default_value_t = 0.9)]
        top_p: f64,
    },
    Reply {
        /// Message to reply to
        #[clap(short, long)]
        message: String,

        /// How the reply should behave
        #[clap(short, long)]
        instruction: String,

        /// What the reply should achieve
        #[clap(short, long)]
        goal: String,

        #[clap(short, long, default_value = "上司の田中さん")]
        reply_to: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_telemetry(&None, true)?;

    let config = Config::load(&args.config_file, args.opt_config)?;
    let load_config = config.clone();
    let model = tokio::task::spawn_blocking(move || CausalLmModel::load(&load_config)).await??;
    let client = ModelClient::new(Arc::new(model), 1);

    match args.cmd {
        Commands::Excuse {
            question,
            max_length,
            temperature,
            top_p,
        } => {
            let request = GenerationRequest {
                max_length,
                temperature,
                top_p,
                ..Default::default()
            };
            let excuse = ExcuseService::new(client)
                .generate_excuse(&question, request)
                .await;
            println!("{}", serde_json::to_string_pretty(&excuse)?);
        }
        Commands::Reply {
            message,
            instruction,
            goal,
            reply_to,
        } => {
            let request = ReplyRequest {
                settings: ReplySettings {
                    user_id: "cli".into(),
                    channel: "cli".into(),
                    reply_to,
                },
                mission: ReplyMission { instruction, goal },
                message: ReplyMessage {
                    content: message,
                    timestamp: Utc::now(),
                },
            };
            let reply = ReplyService::new(client, true)
                .generate_reply(&request)
                .await;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }
    Ok(())
}
