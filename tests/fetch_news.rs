// Tests for the news feed: ordering, defaults and attachment URLs.
use compass_edu::{CompassClient, Error, SessionSnapshot};
use mockito::{Matcher, Server};
use serde_json::json;

const NEWS_PATH: &str = "/Services/NewsFeed.svc/GetMyNewsFeedPaged?sessionstate=readonly";

fn restored_client(server: &Server) -> CompassClient {
    CompassClient::from_snapshot_with_base(
        SessionSnapshot {
            school_prefix: "demo".to_string(),
            cookie: "sid=1".to_string(),
            user_id: "8675".to_string(),
        },
        &server.url(),
    )
    .unwrap()
}

const FEED_BODY: &str = r#"{"d": {"data": [
    {"Title": "Sports day",
     "Content1": "<p>Bring hats</p>",
     "PostDateTime": "2024-02-01T09:00:00Z",
     "UserName": "K. Doe"},
    {"Title": "Newsletter",
     "Content1": null,
     "Content2": "<p>Term one wrap-up</p>",
     "PostDateTime": "2024-02-08T09:00:00Z",
     "EmailSentDate": "2024-02-08T10:00:00Z",
     "Priority": true,
     "Locked": true,
     "CreatedByAdmin": true,
     "UserName": "Principal",
     "UserImageUrl": "/Assets/users/1.jpg",
     "Attachments": [
        {"Name": "Newsletter T1",
         "UiLink": "/Services/FileAssets.svc/DownloadFile?id=n1",
         "IsImage": false,
         "OriginalFileName": "newsletter.pdf"},
        {"Name": "Banner",
         "UiLink": "https://cdn.example/banner.png",
         "IsImage": true}
     ]}
]}}"#;

#[tokio::test]
async fn test_news_comes_back_newest_first() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", NEWS_PATH)
        .match_header("cookie", "sid=1")
        .match_body(Matcher::PartialJson(json!({"start": 0, "limit": 25})))
        .with_status(200)
        .with_body(FEED_BODY)
        .create_async()
        .await;

    let client = restored_client(&server);
    let items = client.fetch_news(0, 25).await.unwrap();
    mock.assert();

    // Feed order was oldest first; output is newest first.
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Newsletter", "Sports day"]);

    let newsletter = &items[0];
    assert_eq!(newsletter.content1, "");
    assert_eq!(newsletter.content2, "<p>Term one wrap-up</p>");
    assert!(newsletter.priority);
    assert!(newsletter.locked);
    assert!(newsletter.by_admin);
    assert!(newsletter.email_sent.is_some());
    assert_eq!(newsletter.sender, "Principal");
    assert_eq!(
        newsletter.sender_image,
        format!("{}/Assets/users/1.jpg", server.url())
    );

    let sports = &items[1];
    assert_eq!(sports.content1, "<p>Bring hats</p>");
    assert_eq!(sports.email_sent, None);
    assert!(!sports.priority);
    assert_eq!(sports.sender_image, "");
    assert!(sports.attachments.is_empty());
}

#[tokio::test]
async fn test_attachment_links_are_absolutized() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", NEWS_PATH)
        .with_status(200)
        .with_body(FEED_BODY)
        .create_async()
        .await;

    let client = restored_client(&server);
    let items = client.fetch_news(0, 25).await.unwrap();
    let attachments = &items[0].attachments;
    assert_eq!(attachments.len(), 2);

    assert_eq!(attachments[0].name, "Newsletter T1");
    assert_eq!(attachments[0].original_file_name, "newsletter.pdf");
    assert!(!attachments[0].is_image);
    assert_eq!(
        attachments[0].url,
        format!("{}/Services/FileAssets.svc/DownloadFile?id=n1", server.url())
    );

    // Already-absolute links are untouched.
    assert_eq!(attachments[1].url, "https://cdn.example/banner.png");
    assert!(attachments[1].is_image);
    assert_eq!(attachments[1].original_file_name, "");
}

#[tokio::test]
async fn test_news_without_post_date_is_malformed() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", NEWS_PATH)
        .with_status(200)
        .with_body(r#"{"d": {"data": [{"Title": "No date"}]}}"#)
        .create_async()
        .await;

    let client = restored_client(&server);
    let err = client.fetch_news(0, 25).await.unwrap_err();
    assert!(matches!(err, Error::MalformedPayload(_)));
}

#[tokio::test]
async fn test_news_with_unreadable_post_date_is_rejected() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", NEWS_PATH)
        .with_status(200)
        .with_body(r#"{"d": {"data": [{"Title": "Bad date", "PostDateTime": "tomorrow-ish"}]}}"#)
        .create_async()
        .await;

    let client = restored_client(&server);
    let err = client.fetch_news(0, 25).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnreadableField {
            field: "PostDateTime",
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_feed_is_ok() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", NEWS_PATH)
        .with_status(200)
        .with_body(r#"{"d": {"data": []}}"#)
        .create_async()
        .await;

    let client = restored_client(&server);
    let items = client.fetch_news(0, 25).await.unwrap();
    assert!(items.is_empty());
}
