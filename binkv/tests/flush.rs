mod common;

#[tokio::test]
async fn flush_check() {
    let mut client = common::spawn_and_connect().await;

    client.set(b"foo", b"1", 0, 0, 0).await.unwrap();
    client.set(b"bar", b"2", 0, 0, 0).await.unwrap();

    client.flush(0).await.unwrap();

    assert!(client.get(b"foo").await.unwrap_err().is_not_found());
    assert!(client.get(b"bar").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delayed_flush_keeps_data_until_deadline() {
    let mut client = common::spawn_and_connect().await;

    client.set(b"foo", b"1", 0, 0, 0).await.unwrap();
    // deadline far in the future, the entry must stay visible
    client.flush(3600).await.unwrap();

    let value = client.get(b"foo").await.unwrap();
    assert_eq!(&value.value[..], b"1");

    // an immediate flush cancels the pending one and clears now
    client.flush(0).await.unwrap();
    assert!(client.get(b"foo").await.unwrap_err().is_not_found());
}
