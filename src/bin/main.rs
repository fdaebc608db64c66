use financial_agent_coordinator::{agent::FinancialAgent, config::CoordinatorConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_QUERIES: &[&str] = &[
    "Show customers who own Tesla stock",
    "What are Apple's main business risks?",
    "Compare Tesla's 10-K strategy with current TSLA price and our customers' holdings",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Financial Agent Coordinator starting");

    let config = CoordinatorConfig::from_env()?;
    let agent = FinancialAgent::from_config(&config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let queries: Vec<String> = if args.is_empty() {
        DEMO_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        vec![args.join(" ")]
    };

    for query in &queries {
        let outcome = agent.query(query).await;

        println!("\n=== QUERY ===");
        println!("{}", query);
        println!("\n=== ANSWER ({:?}) ===", outcome.answer.mode);
        println!("{}", outcome.answer.text);

        if !outcome.answer.contributing_capability_ids.is_empty() {
            let sources: Vec<&str> = outcome
                .answer
                .contributing_capability_ids
                .iter()
                .map(String::as_str)
                .collect();
            println!("\nSources: {}", sources.join(", "));
        }
        if !outcome.answer.masked_fields.is_empty() {
            let masked: Vec<&str> = outcome.answer.masked_fields.iter().map(String::as_str).collect();
            println!("Masked fields: {}", masked.join(", "));
        }

        println!("\nReasoning Trace:");
        for (i, trace) in outcome.reasoning_trace.iter().enumerate() {
            println!("  {}: {}", i + 1, trace);
        }
        println!("Completed in {} ms", outcome.execution_time_ms);
    }

    Ok(())
}
