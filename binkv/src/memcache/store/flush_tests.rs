use super::test_utils::*;

#[test]
fn flush_should_remove_all_elements_in_cache() {
    let server = create_server();
    for key_suffix in 1..10 {
        let mut key_str = BytesMut::from("key");
        key_str.reserve(8);
        key_str.put_slice(key_suffix.to_string().as_bytes());
        let key = key_str.freeze();
        let record = Record::new(from_string("test data"), 0, 0, 0);
        let result = server.storage.set(key.clone(), record);
        assert!(result.is_ok());
    }

    server.storage.flush(Meta::new(0, 0, 0));

    for key_suffix in 1..10 {
        let mut key_str = BytesMut::from("key");
        key_str.reserve(8);
        key_str.put_slice(key_suffix.to_string().as_bytes());
        let result = server.storage.get(&key_str.freeze());
        match result {
            Ok(_) => unreachable!(),
            Err(err) => assert_eq!(err, CacheError::NotFound),
        }
    }
}

#[test]
fn delayed_flush_should_apply_at_deadline() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.storage.flush(Meta::new(0, 0, 3));

    // the deadline has not passed yet
    server.timer.set(2);
    assert!(server.storage.get(&key).is_ok());

    server.timer.set(3);
    let found = server.storage.get(&key);
    match found {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn writes_before_the_flush_deadline_are_wiped_too() {
    let server = create_server();
    server.storage.flush(Meta::new(0, 0, 3));

    let key = Bytes::from("key");
    let record = Record::new(from_string("written while pending"), 0, 0, 0);
    server.timer.set(2);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.get(&key).is_ok());

    server.timer.set(3);
    let found = server.storage.get(&key);
    match found {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn later_flush_supersedes_pending_one() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.storage.flush(Meta::new(0, 0, 2));
    server.storage.flush(Meta::new(0, 0, 10));

    // the first deadline no longer applies
    server.timer.set(5);
    assert!(server.storage.get(&key).is_ok());

    server.timer.set(10);
    let found = server.storage.get(&key);
    match found {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn flush_with_maximum_delay_should_saturate_deadline() {
    let server = create_server();
    server.timer.set(5);
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.storage.flush(Meta::new(0, 0, u32::MAX));

    server.timer.set(100);
    assert!(server.storage.get(&key).is_ok());
}

#[test]
fn flush_should_clear_holds() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 60)).is_ok());

    server.storage.flush(Meta::new(0, 0, 0));

    let record = Record::new(from_string("fresh"), 0, 0, 0);
    let add_result = server.storage.add(key, record);
    assert!(add_result.is_ok());
}

#[test]
fn immediate_flush_cancels_pending_one() {
    let server = create_server();
    server.storage.flush(Meta::new(0, 0, 5));
    server.storage.flush(Meta::new(0, 0, 0));

    let key = Bytes::from("key");
    let record = Record::new(from_string("survivor"), 0, 0, 0);
    server.timer.set(1);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.timer.set(10);
    assert!(server.storage.get(&key).is_ok());
}
