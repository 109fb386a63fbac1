use super::test_utils::*;

#[test]
fn add_should_succeed_if_not_already_stored() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    let result = server.storage.add(key, record);
    assert!(result.is_ok());
}

#[test]
fn add_should_fail_if_already_stored() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    let result = server.storage.set(key.clone(), record.clone());
    assert!(result.is_ok());
    let add_result = server.storage.add(key, record);
    match add_result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::KeyExists),
    }
}

#[test]
fn add_should_fail_while_hold_is_active() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 5)).is_ok());

    let record = Record::new(from_string("too early"), 0, 0, 0);
    let add_result = server.storage.add(key, record);
    match add_result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::KeyExists),
    }
}

#[test]
fn add_should_succeed_after_hold_expires() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 5)).is_ok());

    server.timer.set(5);
    let record = Record::new(from_string("after hold"), 0, 0, 0);
    let add_result = server.storage.add(key.clone(), record.clone());
    assert!(add_result.is_ok());
    assert_eq!(server.storage.get(&key).unwrap(), record);
}

#[test]
fn add_should_succeed_after_entry_expires() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 3);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.timer.set(4);
    let record = Record::new(from_string("replacement"), 0, 0, 0);
    let add_result = server.storage.add(key, record);
    assert!(add_result.is_ok());
}
