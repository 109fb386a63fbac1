use super::test_utils::*;

#[test]
fn delete_should_remove_entry() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record.clone()).is_ok());

    let result = server.storage.delete(key.clone(), Meta::new(0, 0, 0));
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), record);

    let found = server.storage.get(&key);
    match found {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn delete_missing_key_should_fail() {
    let server = create_server();
    let key = Bytes::from("key");
    let result = server.storage.delete(key, Meta::new(0, 0, 0));
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn delete_with_hold_hides_key_from_get() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 10)).is_ok());

    let found = server.storage.get(&key);
    match found {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn delete_on_held_key_should_fail_and_keep_hold() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 10)).is_ok());

    let result = server.storage.delete(key.clone(), Meta::new(0, 0, 0));
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }

    // the original hold still gates add
    let record = Record::new(from_string("too early"), 0, 0, 0);
    let add_result = server.storage.add(key, record);
    match add_result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::KeyExists),
    }
}

#[test]
fn delete_with_maximum_hold_should_saturate_deadline() {
    let server = create_server();
    server.timer.set(5);
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server
        .storage
        .delete(key.clone(), Meta::new(0, 0, u32::MAX))
        .is_ok());

    let record = Record::new(from_string("too early"), 0, 0, 0);
    let add_result = server.storage.add(key, record);
    match add_result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::KeyExists),
    }
}

#[test]
fn delete_expired_entry_should_fail() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 3);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.timer.set(5);
    let result = server.storage.delete(key, Meta::new(0, 0, 0));
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}
