use super::test_utils::*;

#[test]
fn replace_should_fail_if_not_stored() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    let result = server.storage.replace(key, record);
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn replace_should_succeed_if_stored() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());

    let new_record = Record::new(from_string("new test data"), 0, 0, 0);
    let result = server.storage.replace(key.clone(), new_record.clone());
    assert!(result.is_ok());
    assert_eq!(server.storage.get(&key).unwrap(), new_record);
}

#[test]
fn replace_should_fail_while_hold_is_active() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());
    assert!(server.storage.delete(key.clone(), Meta::new(0, 0, 5)).is_ok());

    let record = Record::new(from_string("too early"), 0, 0, 0);
    let result = server.storage.replace(key, record);
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}

#[test]
fn replace_should_fail_on_cas_mismatch() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    assert!(server.storage.set(key.clone(), record).is_ok());

    let stale = Record::new(from_string("stale data"), 0xBAD, 0, 0);
    let result = server.storage.replace(key, stale);
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::KeyExists),
    }
}

#[test]
fn replace_with_matching_cas_should_succeed() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 0);
    let cas = server.storage.set(key.clone(), record).unwrap().cas;

    let record = Record::new(from_string("versioned data"), cas, 0, 0);
    let result = server.storage.replace(key, record);
    assert!(result.is_ok());
    assert!(result.unwrap().cas != cas);
}

#[test]
fn replace_should_fail_on_expired_entry() {
    let server = create_server();
    let key = Bytes::from("key");
    let record = Record::new(from_string("test data"), 0, 0, 3);
    assert!(server.storage.set(key.clone(), record).is_ok());

    server.timer.set(3);
    let record = Record::new(from_string("too late"), 0, 0, 0);
    let result = server.storage.replace(key, record);
    match result {
        Ok(_) => unreachable!(),
        Err(err) => assert_eq!(err, CacheError::NotFound),
    }
}
