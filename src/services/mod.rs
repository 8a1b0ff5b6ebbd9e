pub mod jadwal_service;
pub mod kontrol_service;
