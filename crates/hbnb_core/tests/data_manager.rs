use hbnb_core::{
    Amenity, City, ConflictError, Country, DataError, DataManager, DeleteMode, Dependent, Entity,
    EntityKind, FileStore, MemoryStore, NewPlace, NewUser, Place, PlaceUpdate, Review,
    ReviewUpdate, StoreError, StoreOptions, User, UserUpdate, ValidationError,
};
use std::collections::BTreeSet;
use std::fs;
use uuid::Uuid;

fn manager() -> DataManager<MemoryStore> {
    DataManager::new(MemoryStore::new())
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: "s3cret".to_string(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        ..NewUser::default()
    }
}

fn new_place(city: &City) -> NewPlace {
    NewPlace {
        name: "Loft".to_string(),
        address: "1 Main St".to_string(),
        latitude: 40.7128,
        longitude: -74.006,
        city_id: city.id(),
        number_of_rooms: 2,
        number_of_bathrooms: 1,
        price_per_night: 120.0,
        max_guests: 4,
        ..NewPlace::default()
    }
}

struct Fixture {
    manager: DataManager<MemoryStore>,
    country: Country,
    city: City,
    host: User,
    guest: User,
    place: Place,
}

fn fixture() -> Fixture {
    let manager = manager();
    let country = manager.create_country("United States", "US").unwrap();
    let city = manager.create_city("New York", country.id()).unwrap();
    let host = manager.create_user(new_user("host@example.com")).unwrap();
    let guest = manager.create_user(new_user("guest@example.com")).unwrap();
    let place = manager
        .create_place(NewPlace {
            host_id: Some(host.id()),
            ..new_place(&city)
        })
        .unwrap();
    Fixture {
        manager,
        country,
        city,
        host,
        guest,
        place,
    }
}

#[test]
fn country_city_place_scenario() {
    let fx = fixture();

    let country = fx.manager.find_country_by_code("us").unwrap().unwrap();
    assert_eq!(country.id(), fx.country.id());
    assert_eq!(
        fx.manager.list_cities_in_country(fx.country.id()).unwrap(),
        vec![fx.city.clone()]
    );
    assert_eq!(
        fx.manager.list_places_in_city(fx.city.id()).unwrap(),
        vec![fx.place.clone()]
    );
    assert_eq!(
        fx.manager.list_places_by_host(fx.host.id()).unwrap(),
        vec![fx.place.clone()]
    );
    assert!(fx.manager.list_places_by_host(fx.guest.id()).unwrap().is_empty());

    fx.manager
        .create_review(fx.place.id(), fx.guest.id(), 4, "Great view")
        .unwrap();
    let reviews = fx.manager.list_reviews_for_place(fx.place.id()).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].place_id(), fx.place.id());
    assert_eq!(reviews[0].comment(), "Great view");
}

#[test]
fn duplicate_email_is_a_conflict() {
    let manager = manager();
    manager.create_user(new_user("ada@example.com")).unwrap();

    let err = manager
        .create_user(new_user("ada@example.com"))
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::DuplicateEmail)
    ));
    assert_eq!(manager.count(EntityKind::User).unwrap(), 1);
}

#[test]
fn changing_email_to_a_taken_one_is_a_conflict() {
    let manager = manager();
    manager.create_user(new_user("ada@example.com")).unwrap();
    let other = manager.create_user(new_user("bob@example.com")).unwrap();

    let err = manager
        .update_user(
            other.id(),
            UserUpdate {
                email: Some("ada@example.com".to_string()),
                ..UserUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, DataError::Conflict(ConflictError::DuplicateEmail)));

    let stored: User = manager.get(other.id()).unwrap().unwrap();
    assert_eq!(stored.email(), "bob@example.com");

    // Re-saving a user's own email is not a conflict.
    manager
        .update_user(
            other.id(),
            UserUpdate {
                email: Some("bob@example.com".to_string()),
                first_name: Some("Robert".to_string()),
                ..UserUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(
        manager.find_user_by_email("bob@example.com").unwrap().unwrap().first_name(),
        "Robert"
    );
}

#[test]
fn duplicate_country_code_is_a_conflict() {
    let manager = manager();
    manager.create_country("United States", "US").unwrap();

    let err = manager.create_country("USA", " us ").unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::DuplicateCountryCode(code)) if code == "US"
    ));

    let err = manager.create_country("Nowhere", "XX").unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::InvalidCountryCode(_))
    ));
}

#[test]
fn duplicate_amenity_name_is_a_conflict() {
    let manager = manager();
    manager.create_amenity("Wi-Fi", "fast").unwrap();

    let err = manager.create_amenity("Wi-Fi", "slow").unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::DuplicateAmenityName(_))
    ));
}

#[test]
fn review_rating_is_range_checked() {
    let fx = fixture();

    let err = fx
        .manager
        .create_review(fx.place.id(), fx.guest.id(), 6, "too good")
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::RatingOutOfRange(6))
    ));
    assert_eq!(fx.manager.count(EntityKind::Review).unwrap(), 0);

    let review = fx
        .manager
        .create_review(fx.place.id(), fx.guest.id(), 3, "fine")
        .unwrap();
    assert_eq!(review.rating(), 3);

    let err = fx
        .manager
        .update_review(
            review.id(),
            ReviewUpdate {
                rating: Some(0),
                ..ReviewUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
    let stored: Review = fx.manager.get(review.id()).unwrap().unwrap();
    assert_eq!(stored.rating(), 3);
}

#[test]
fn host_cannot_review_own_place() {
    let fx = fixture();

    let err = fx
        .manager
        .create_review(fx.place.id(), fx.host.id(), 5, "great")
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::HostCannotReview { .. })
    ));
}

#[test]
fn review_references_must_resolve() {
    let fx = fixture();

    let err = fx
        .manager
        .create_review(Uuid::new_v4(), fx.guest.id(), 4, "")
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::UnresolvedReference {
            kind: EntityKind::Place,
            ..
        })
    ));
}

#[test]
fn assign_host_is_write_once() {
    let fx = fixture();
    let unhosted = fx.manager.create_place(new_place(&fx.city)).unwrap();
    assert_eq!(unhosted.host_id(), None);

    let hosted = fx.manager.assign_host(unhosted.id(), fx.host.id()).unwrap();
    assert_eq!(hosted.host_id(), Some(fx.host.id()));

    let again = fx.manager.assign_host(unhosted.id(), fx.host.id()).unwrap();
    assert_eq!(again, hosted);

    let err = fx
        .manager
        .assign_host(unhosted.id(), fx.guest.id())
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::HostAlreadyAssigned { host_id, .. }) if host_id == fx.host.id()
    ));
}

#[test]
fn reviewer_cannot_become_host() {
    let fx = fixture();
    let unhosted = fx.manager.create_place(new_place(&fx.city)).unwrap();
    fx.manager
        .create_review(unhosted.id(), fx.guest.id(), 4, "cozy")
        .unwrap();

    let err = fx
        .manager
        .assign_host(unhosted.id(), fx.guest.id())
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Conflict(ConflictError::ReviewerCannotHost { .. })
    ));
}

#[test]
fn mutating_an_unknown_id_is_not_found() {
    let manager = manager();
    let missing = Uuid::new_v4();

    let err = manager
        .update_place(missing, PlaceUpdate::default())
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::NotFound {
            kind: EntityKind::Place,
            id
        } if id == missing
    ));
    assert_eq!(manager.get::<Place>(missing).unwrap(), None);
}

#[test]
fn place_update_validates_ranges_and_city() {
    let fx = fixture();

    let err = fx
        .manager
        .update_place(
            fx.place.id(),
            PlaceUpdate {
                latitude: Some(91.0),
                ..PlaceUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::LatitudeOutOfRange(_))
    ));

    let err = fx
        .manager
        .update_place(
            fx.place.id(),
            PlaceUpdate {
                city_id: Some(Uuid::new_v4()),
                ..PlaceUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::UnresolvedReference { .. })
    ));

    let updated = fx
        .manager
        .update_place(
            fx.place.id(),
            PlaceUpdate {
                price_per_night: Some(99.5),
                ..PlaceUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.price_per_night(), 99.5);
    assert!(updated.identity().updated_at() >= fx.place.identity().updated_at());
}

#[test]
fn amenity_links_stay_symmetric() {
    let fx = fixture();
    let wifi = fx.manager.create_amenity("Wi-Fi", "").unwrap();

    let attached = fx.manager.attach_amenity(wifi.id(), fx.place.id()).unwrap();
    assert!(attached.place_ids().contains(&fx.place.id()));
    let place: Place = fx.manager.get(fx.place.id()).unwrap().unwrap();
    assert!(place.amenity_ids().contains(&wifi.id()));

    // Attaching twice changes nothing.
    let again = fx.manager.attach_amenity(wifi.id(), fx.place.id()).unwrap();
    assert_eq!(again, attached);

    let detached = fx.manager.detach_amenity(wifi.id(), fx.place.id()).unwrap();
    assert!(detached.place_ids().is_empty());
    let place: Place = fx.manager.get(fx.place.id()).unwrap().unwrap();
    assert!(place.amenity_ids().is_empty());
}

#[test]
fn create_place_links_listed_amenities() {
    let fx = fixture();
    let pool = fx.manager.create_amenity("Pool", "heated").unwrap();

    let place = fx
        .manager
        .create_place(NewPlace {
            amenity_ids: BTreeSet::from([pool.id()]),
            ..new_place(&fx.city)
        })
        .unwrap();

    let pool: Amenity = fx.manager.get(pool.id()).unwrap().unwrap();
    assert!(pool.place_ids().contains(&place.id()));

    let err = fx
        .manager
        .create_place(NewPlace {
            amenity_ids: BTreeSet::from([Uuid::new_v4()]),
            ..new_place(&fx.city)
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::Validation(ValidationError::UnresolvedReference {
            field: "amenity_ids",
            ..
        })
    ));
    assert_eq!(fx.manager.count(EntityKind::Place).unwrap(), 2);
}

#[test]
fn referenced_city_delete_is_blocked() {
    let fx = fixture();

    let err = fx
        .manager
        .delete(EntityKind::City, fx.city.id(), DeleteMode::Block)
        .unwrap_err();
    match err {
        DataError::ReferentialIntegrity { dependents, .. } => {
            assert_eq!(
                dependents,
                vec![Dependent {
                    kind: EntityKind::Place,
                    id: fx.place.id()
                }]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fx.manager.get::<City>(fx.city.id()).unwrap().is_some());

    let empty = fx.manager.create_city("Boston", fx.country.id()).unwrap();
    assert!(fx
        .manager
        .delete(EntityKind::City, empty.id(), DeleteMode::Block)
        .unwrap());
    assert!(!fx
        .manager
        .delete(EntityKind::City, empty.id(), DeleteMode::Block)
        .unwrap());
}

#[test]
fn country_cascade_removes_everything_below_it() {
    let fx = fixture();
    let wifi = fx.manager.create_amenity("Wi-Fi", "").unwrap();
    fx.manager.attach_amenity(wifi.id(), fx.place.id()).unwrap();
    let review = fx
        .manager
        .create_review(fx.place.id(), fx.guest.id(), 5, "")
        .unwrap();
    let resident = fx
        .manager
        .create_user(NewUser {
            city_id: Some(fx.city.id()),
            country_id: Some(fx.country.id()),
            ..new_user("resident@example.com")
        })
        .unwrap();

    assert!(fx
        .manager
        .delete(EntityKind::Country, fx.country.id(), DeleteMode::Cascade)
        .unwrap());

    assert_eq!(fx.manager.get::<Country>(fx.country.id()).unwrap(), None);
    assert_eq!(fx.manager.get::<City>(fx.city.id()).unwrap(), None);
    assert_eq!(fx.manager.get::<Place>(fx.place.id()).unwrap(), None);
    assert_eq!(fx.manager.get::<Review>(review.id()).unwrap(), None);

    let resident: User = fx.manager.get(resident.id()).unwrap().unwrap();
    assert_eq!(resident.city_id(), None);
    assert_eq!(resident.country_id(), None);
    let wifi: Amenity = fx.manager.get(wifi.id()).unwrap().unwrap();
    assert!(wifi.place_ids().is_empty());
    assert!(fx.manager.get::<User>(fx.host.id()).unwrap().is_some());
}

#[test]
fn user_cascade_removes_hosted_places_and_reviews() {
    let fx = fixture();
    let other_place = fx.manager.create_place(new_place(&fx.city)).unwrap();
    let review = fx
        .manager
        .create_review(other_place.id(), fx.host.id(), 4, "")
        .unwrap();
    let guest_review = fx
        .manager
        .create_review(fx.place.id(), fx.guest.id(), 2, "")
        .unwrap();

    fx.manager
        .delete(EntityKind::User, fx.host.id(), DeleteMode::Cascade)
        .unwrap();

    assert_eq!(fx.manager.get::<Place>(fx.place.id()).unwrap(), None);
    assert_eq!(fx.manager.get::<Review>(review.id()).unwrap(), None);
    assert_eq!(fx.manager.get::<Review>(guest_review.id()).unwrap(), None);
    assert!(fx.manager.get::<Place>(other_place.id()).unwrap().is_some());
    assert!(fx
        .manager
        .list_reviews_by_user(fx.guest.id())
        .unwrap()
        .is_empty());
}

#[test]
fn amenity_delete_detaches_from_places() {
    let fx = fixture();
    let wifi = fx.manager.create_amenity("Wi-Fi", "").unwrap();
    fx.manager.attach_amenity(wifi.id(), fx.place.id()).unwrap();

    let err = fx
        .manager
        .delete(EntityKind::Amenity, wifi.id(), DeleteMode::Block)
        .unwrap_err();
    assert!(matches!(err, DataError::ReferentialIntegrity { .. }));

    fx.manager
        .delete(EntityKind::Amenity, wifi.id(), DeleteMode::Cascade)
        .unwrap();
    let place: Place = fx.manager.get(fx.place.id()).unwrap().unwrap();
    assert!(place.amenity_ids().is_empty());
}

#[test]
fn review_queries_filter_by_place_and_user() {
    let fx = fixture();
    let other = fx.manager.create_user(new_user("other@example.com")).unwrap();
    let first = fx
        .manager
        .create_review(fx.place.id(), fx.guest.id(), 5, "")
        .unwrap();
    let second = fx
        .manager
        .create_review(fx.place.id(), other.id(), 1, "")
        .unwrap();

    let for_place: BTreeSet<_> = fx
        .manager
        .list_reviews_for_place(fx.place.id())
        .unwrap()
        .iter()
        .map(Review::id)
        .collect();
    assert_eq!(for_place, BTreeSet::from([first.id(), second.id()]));
    assert_eq!(
        fx.manager.list_reviews_by_user(other.id()).unwrap(),
        vec![second]
    );
}

#[test]
fn file_backed_manager_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file_storage.json");

    let (country_id, city_id) = {
        let manager = DataManager::new(FileStore::open(&path).unwrap());
        let country = manager.create_country("Japan", "JP").unwrap();
        let city = manager.create_city("Kyoto", country.id()).unwrap();
        (country.id(), city.id())
    };

    let manager = DataManager::new(FileStore::open(&path).unwrap());
    let city: City = manager.get(city_id).unwrap().unwrap();
    assert_eq!(city.country_id(), country_id);
    assert_eq!(manager.list::<Country>().unwrap().len(), 1);

    let store = manager.into_inner();
    assert_eq!(store.path(), path.as_path());
}

#[test]
fn failed_cascade_write_leaves_every_record_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file_storage.json");
    let mut options = StoreOptions::new(&path);
    options.write_attempts = 1;
    let manager = DataManager::new(FileStore::open_with(options).unwrap());

    let country = manager.create_country("Japan", "JP").unwrap();
    let city = manager.create_city("Kyoto", country.id()).unwrap();
    let place = manager.create_place(new_place(&city)).unwrap();
    let canonical = fs::read(&path).unwrap();

    // A directory in the temp slot makes the durable write fail.
    fs::create_dir(dir.path().join("file_storage.json.tmp")).unwrap();
    let err = manager
        .delete(EntityKind::Country, country.id(), DeleteMode::Cascade)
        .unwrap_err();

    assert!(matches!(err, DataError::Storage(StoreError::Io { .. })));
    assert_eq!(err.code(), "storage_io");
    assert_eq!(manager.get::<Country>(country.id()).unwrap(), Some(country));
    assert_eq!(manager.get::<City>(city.id()).unwrap(), Some(city));
    assert_eq!(manager.get::<Place>(place.id()).unwrap(), Some(place));
    assert_eq!(fs::read(&path).unwrap(), canonical);
}

#[test]
fn user_location_can_be_cleared() {
    let fx = fixture();
    let resident = fx
        .manager
        .create_user(NewUser {
            city_id: Some(fx.city.id()),
            country_id: Some(fx.country.id()),
            ..new_user("resident@example.com")
        })
        .unwrap();

    let moved = fx
        .manager
        .clear_user_location(resident.id(), true, false)
        .unwrap();
    assert_eq!(moved.city_id(), None);
    assert_eq!(moved.country_id(), Some(fx.country.id()));

    let stored: User = fx.manager.get(resident.id()).unwrap().unwrap();
    assert_eq!(stored, moved);

    // The cleared user no longer holds the city back.
    match fx
        .manager
        .delete(EntityKind::City, fx.city.id(), DeleteMode::Block)
        .unwrap_err()
    {
        DataError::ReferentialIntegrity { dependents, .. } => {
            assert_eq!(
                dependents,
                vec![Dependent {
                    kind: EntityKind::Place,
                    id: fx.place.id()
                }]
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = fx
        .manager
        .clear_user_location(Uuid::new_v4(), true, true)
        .unwrap_err();
    assert!(matches!(err, DataError::NotFound { kind: EntityKind::User, .. }));
}
