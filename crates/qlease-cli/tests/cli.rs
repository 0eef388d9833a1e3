use assert_cmd::Command;
use predicates::prelude::*;
use testcontainers::ContainerAsync;
use testcontainers_modules::{
    localstack::LocalStack,
    testcontainers::{runners::AsyncRunner, ImageExt, TestcontainersError},
};

fn qlease() -> Command {
    let mut cmd = Command::cargo_bin("qlease").unwrap();
    cmd.env_remove("SQS_QUEUE_NAME")
        .env_remove("SQS_AWS_REGION")
        .env_remove("SQS_ENDPOINT");
    cmd
}

pub async fn localstack() -> Result<(String, ContainerAsync<LocalStack>), TestcontainersError> {
    let request = LocalStack::default()
        .with_tag("latest")
        .with_env_var("SERVICES", "sqs")
        .with_env_var("SKIP_SSL_CERT_DOWNLOAD", "1");
    let container = request.start().await?;

    let host_ip = container.get_host().await?;
    let host_port = container.get_host_port_ipv4(4566).await?;
    let endpoint_url = format!("http://{host_ip}:{host_port}");

    Ok((endpoint_url, container))
}

pub async fn create_test_queue(
    container: &ContainerAsync<LocalStack>,
    name: &str,
) -> Result<(), TestcontainersError> {
    let create_queue_command = testcontainers::core::ExecCommand::new([
        "awslocal",
        "sqs",
        "create-queue",
        "--queue-name",
        name,
    ])
    .with_container_ready_conditions(vec![testcontainers::core::WaitFor::message_on_stdout(
        "AWS sqs.CreateQueue => 200",
    )]);

    container.exec(create_queue_command).await?;
    Ok(())
}

#[test]
fn command_does_not_exist() {
    qlease()
        .arg("something")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: unrecognized subcommand"));
}

#[test]
fn help_lists_subcommands() {
    qlease().arg("--help").assert().success().stdout(
        predicate::str::contains("send")
            .and(predicate::str::contains("receive"))
            .and(predicate::str::contains("drain"))
            .and(predicate::str::contains("ack")),
    );
}

#[test]
fn missing_queue_name_is_reported() {
    qlease()
        .args(["send", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("You must supply the name of a queue"));
}

#[test]
fn malformed_endpoint_is_reported_without_panicking() {
    qlease()
        .args(["--queue", "demo", "--endpoint", "localhost:4566", "send", "hello"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("invalid configuration")
                .and(predicate::str::contains("panicked").not()),
        );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn send_then_drain() {
    let (endpoint, container) = localstack().await.unwrap();
    create_test_queue(&container, "demo").await.unwrap();

    qlease()
        .args(["--local", "--endpoint", &endpoint, "--queue", "demo"])
        .args(["send", r#"{"Name":"John Doe"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent message"));

    qlease()
        .args(["--local", "--endpoint", &endpoint, "--queue", "demo"])
        .arg("drain")
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""body":"{\"Name\":\"John Doe\"}""#)
                .and(predicate::str::contains("[DELETED] Message ID:")),
        );

    qlease()
        .args(["--local", "--endpoint", &endpoint, "--queue", "demo"])
        .arg("receive")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    container.stop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn send_lines_from_stdin() {
    let (endpoint, container) = localstack().await.unwrap();
    create_test_queue(&container, "lines").await.unwrap();

    qlease()
        .args(["--local", "--endpoint", &endpoint, "--queue", "lines", "send"])
        .write_stdin("Test message 0\n\nTest message 1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 2 message(s)"));

    container.stop().await.unwrap();
}
