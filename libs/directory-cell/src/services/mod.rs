pub mod users;
pub mod doctors;
pub mod specialties;

pub use users::UserService;
pub use doctors::DoctorProfileService;
pub use specialties::SpecialtyService;
