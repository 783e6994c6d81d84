pub mod compose_xml;
