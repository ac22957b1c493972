use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use num_bigint::BigUint;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use merkle_airdrop::{
    allocation_parser,
    executor::RemoteSpawner,
    hash::{from_hex, to_hex},
    parse_units, verify_allocation, Address, AggregationMerkleTree, AirdropError, Allocation,
    Campaign, CampaignConfig, Distribution, InMemoryCustody, LeafOrder, MerkleOutput, MerkleTree,
    Orchestrator, ProofSet, Tree,
};

const CAMPAIGN_ACCOUNT: Address = Address::new([0xa1; 20]);
const CAMPAIGN_ADMIN: Address = Address::new([0xad; 20]);

#[derive(Parser, Debug)]
#[command(name = "merkle-airdrop")]
#[command(about = "Build, verify and simulate Merkle airdrops", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the Merkle root and proofs from allocation CSV files
    BuildTree(BuildTreeArgs),
    /// Check a recipient's proof against a published root
    Verify(VerifyArgs),
    /// Run a whole campaign in memory: fund, claim every allocation, withdraw the rest
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Allocation CSV files with an `address,amount` header, in leaf order
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Decimals used to scale CSV amounts into base units
    #[arg(short, long, default_value_t = merkle_airdrop::orchestrator::DEFAULT_DECIMALS)]
    decimals: u32,

    /// Sort leaves by digest before building the tree
    #[arg(long, conflicts_with = "workers")]
    sorted: bool,

    /// Mini-tree worker addresses; each input file becomes one mini tree
    #[arg(short, long, num_args = 1..)]
    workers: Vec<String>,
}

#[derive(Args, Debug)]
struct BuildTreeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output file for the Merkle root
    #[arg(short, long, default_value = "merkle.json")]
    root_output: PathBuf,

    /// Output file for the address -> proof map
    #[arg(short, long, default_value = "proof.json")]
    proof_output: PathBuf,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Published root, or a merkle.json file holding it
    #[arg(short, long)]
    root: String,

    #[arg(short, long)]
    address: String,

    /// Allocated amount in tokens
    #[arg(long)]
    amount: String,

    #[arg(short, long, default_value_t = merkle_airdrop::orchestrator::DEFAULT_DECIMALS)]
    decimals: u32,

    #[arg(short, long, default_value = "proof.json")]
    proof_file: PathBuf,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Tokens funded on top of the allocated total, recovered by the admin withdrawal
    #[arg(long, default_value = "0")]
    surplus: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::BuildTree(args) => build_tree(args).await,
        Commands::Verify(args) => verify(args),
        Commands::Simulate(args) => simulate(args).await,
    }
}

/// The distribution behind a command, built locally or by mini-tree workers.
enum Loaded {
    Local(Distribution<MerkleTree>),
    Aggregated(Distribution<AggregationMerkleTree>),
}

async fn load_distribution(args: &InputArgs) -> Result<Loaded> {
    let mut allocations = Vec::<Allocation>::new();
    for path in &args.input {
        let chunk = allocation_parser(path, args.decimals)
            .map_err(|e| anyhow!("{}: {}", path.display(), e))?;
        allocations.extend(chunk);
    }
    info!(
        allocations = allocations.len(),
        files = args.input.len(),
        "loaded allocations"
    );

    if args.workers.is_empty() {
        let order = if args.sorted {
            LeafOrder::Sorted
        } else {
            LeafOrder::AsGiven
        };
        return Ok(Loaded::Local(Distribution::new(allocations, order)?));
    }

    let csvs = args
        .input
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect::<Vec<String>>();
    let executor_count = args.workers.len();
    let spawner = RemoteSpawner::new(args.workers.clone())?;
    let orchestrator = Orchestrator::new(Box::new(spawner), csvs).with_decimals(args.decimals);

    let tree = orchestrator
        .create_aggregation_tree(executor_count)
        .await
        .map_err(|e| anyhow!("building mini trees failed: {}", e))?;
    Ok(Loaded::Aggregated(Distribution::from_tree(tree, allocations)?))
}

async fn build_tree(args: BuildTreeArgs) -> Result<()> {
    match load_distribution(&args.input).await? {
        Loaded::Local(distribution) => write_outputs(&distribution, &args),
        Loaded::Aggregated(distribution) => write_outputs(&distribution, &args),
    }
}

fn write_outputs<T: Tree>(distribution: &Distribution<T>, args: &BuildTreeArgs) -> Result<()> {
    distribution
        .merkle_output()
        .write_to(&args.root_output)
        .map_err(|e| anyhow!("{}: {}", args.root_output.display(), e))?;
    distribution
        .proof_set()
        .write_to(&args.proof_output)
        .map_err(|e| anyhow!("{}: {}", args.proof_output.display(), e))?;

    println!("Merkle root: {}", to_hex(distribution.root()));
    println!("Recipients: {}", distribution.len());
    println!("Root written to {}", args.root_output.display());
    println!("Proofs written to {}", args.proof_output.display());
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<()> {
    let root = if args.root.starts_with("0x") || args.root.starts_with("0X") {
        from_hex(&args.root)?
    } else {
        MerkleOutput::read_from(&args.root)
            .map_err(|e| anyhow!("{}: {}", args.root, e))?
            .root()?
    };
    let address = args.address.parse::<Address>()?;
    let amount = parse_units(&args.amount, args.decimals)?;

    let proofs = ProofSet::read_from(&args.proof_file)
        .map_err(|e| anyhow!("{}: {}", args.proof_file.display(), e))?;
    let proof = proofs
        .proof_for(&address)?
        .with_context(|| format!("no proof for {} in {}", address, args.proof_file.display()))?;

    match verify_allocation(&address, &amount, &proof, &root) {
        Ok(leaf) => {
            println!(
                "Valid: {} may claim {} (leaf {})",
                address,
                amount,
                to_hex(&leaf)
            );
            Ok(())
        }
        Err(AirdropError::InvalidProof) => bail!("{} is not entitled to {}", address, amount),
        Err(e) => Err(e.into()),
    }
}

async fn simulate(args: SimulateArgs) -> Result<()> {
    let surplus = parse_units(&args.surplus, args.input.decimals)?;
    match load_distribution(&args.input).await? {
        Loaded::Local(distribution) => run_campaign(&distribution, surplus),
        Loaded::Aggregated(distribution) => run_campaign(&distribution, surplus),
    }
}

fn run_campaign<T: Tree>(distribution: &Distribution<T>, surplus: BigUint) -> Result<()> {
    let total = distribution
        .allocations()
        .iter()
        .fold(BigUint::default(), |sum, allocation| sum + &allocation.amount);

    let custody = Arc::new(InMemoryCustody::new());
    custody.mint(&CAMPAIGN_ACCOUNT, &(&total + &surplus));

    let campaign = Campaign::new(
        CampaignConfig {
            merkle_root: *distribution.root(),
            account: CAMPAIGN_ACCOUNT,
            admin: CAMPAIGN_ADMIN,
        },
        custody,
    );
    info!(
        funded = %campaign.balance(),
        root = %to_hex(campaign.merkle_root()),
        "campaign funded"
    );

    for allocation in distribution.allocations() {
        let proof = distribution
            .proof_for(&allocation.recipient)
            .with_context(|| format!("missing proof for {}", allocation.recipient))?;
        campaign.claim(&allocation.recipient, &allocation.amount, &proof.siblings)?;
    }

    if let Some(first) = distribution.allocations().first() {
        let proof = distribution
            .proof_for(&first.recipient)
            .with_context(|| format!("missing proof for {}", first.recipient))?;
        match campaign.claim(&first.recipient, &first.amount, &proof.siblings) {
            Err(AirdropError::AlreadyClaimed(_)) => {
                info!(recipient = %first.recipient, "second claim refused")
            }
            other => bail!(
                "second claim by {} was not refused: {:?}",
                first.recipient,
                other
            ),
        }
    }

    match campaign.withdraw(&CAMPAIGN_ACCOUNT) {
        Err(AirdropError::Unauthorized(_)) => info!("withdrawal by a non-admin refused"),
        other => bail!("withdrawal by a non-admin was not refused: {:?}", other),
    }
    let withdrawn = campaign.withdraw(&CAMPAIGN_ADMIN)?;

    println!("Merkle root: {}", to_hex(campaign.merkle_root()));
    println!(
        "Claims: {} of {} redeemed",
        campaign.ledger().claimed_count(),
        distribution.len()
    );
    println!("Distributed: {}", total);
    println!("Withdrawn by admin: {}", withdrawn);
    println!("Remaining balance: {}", campaign.balance());
    Ok(())
}
