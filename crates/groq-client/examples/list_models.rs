use groq_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = GroqClient::from_env()?;

    let models = client.list_models().await?;
    for model in &models.data {
        println!(
            "Model ID: {}, Owned By: {}, Active: {}, Context Window: {}",
            model.id, model.owned_by, model.active, model.context_window
        );
    }

    let mixtral = client.retrieve_model(&ModelId::mixtral_8x7b()).await?;
    println!("retrieved {} (active: {})", mixtral.id, mixtral.active);
    Ok(())
}
