use doc_gateway::{
    config::Config,
    inference::{GradioClient, InferenceClient},
};

fn live_client() -> GradioClient {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("config from environment");
    GradioClient::from_config(&config).expect("gradio client")
}

#[tokio::test]
#[ignore = "Requires the hosted inference Space"]
async fn live_space_answers_echo() {
    let reply = live_client()
        .echo("Hello!!")
        .await
        .expect("echo from the Space");
    assert!(!reply.is_empty(), "echo reply should not be empty");
}

#[tokio::test]
#[ignore = "Requires the hosted inference Space"]
async fn live_space_answers_questions() {
    let answer = live_client()
        .ask("What is the document about")
        .await
        .expect("answer from the Space");
    assert!(!answer.is_null(), "answer should not be empty");
}
