use groq_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = GroqClient::from_env()?;

    let req = ChatCompletionRequest::new(ModelId::llama3_70b())
        .message(Message::user("Explain the importance of fast language models"))
        .max_tokens(1000)
        .temperature(0.7)
        .top_p(0.9)
        .num_choices(1)
        .stream(true);

    let mut stream = client.create_chat_completion_stream(&req).await?;
    while let Some(fragment) = stream.next_fragment().await {
        match fragment {
            Fragment::Chunk(chunk) => print!("{}", chunk.text()),
            Fragment::Error(err) => {
                eprintln!("stream error: {err}");
                break;
            }
        }
    }
    println!();
    Ok(())
}
