use steam_community::{parse_roster, FetchError, GroupClient};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// Answers exactly one request with the given status and body, and hands back
/// the request head it saw.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let jh = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&head).into_owned()
    });

    (base, jh)
}

#[tokio::test]
async fn fetches_roster() {
    let body = "<memberList><members><member><steamID64>76561198000000001</steamID64></member></members></memberList>";
    let (base, server) = serve_once("200 OK", body).await;

    let client = GroupClient::with_base_url(&base, 5);
    let xml = client.fetch_roster().await.unwrap();
    assert_eq!(xml, body);

    let head = server.await.unwrap();
    assert!(head.starts_with("GET /gid/103582791429521413/memberslistxml/?xml=1 HTTP/1.1"), "{}", head);
    assert!(head.to_ascii_lowercase().contains("user-agent: steamadmingroup"));

    let roster = parse_roster(&xml).unwrap();
    assert_eq!(roster.members.len(), 1);
    assert_eq!(roster.members[0].to_string(), "76561198000000001");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (base, server) = serve_once("503 Service Unavailable", "<html>busy</html>").await;

    let client = GroupClient::with_base_url(&base, 5);
    match client.fetch_roster().await {
        Err(FetchError::Status(status)) => assert_eq!(status.as_u16(), 503),
        other => panic!("expected status error, got {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_an_error() {
    // Bind and drop, so the port is (very likely) closed.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = GroupClient::with_base_url(&format!("http://127.0.0.1:{}", port), 5);
    assert!(matches!(client.fetch_roster().await, Err(FetchError::Http(_))));
}
