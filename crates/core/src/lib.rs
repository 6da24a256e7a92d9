pub mod detection {
    pub mod domain {
        pub mod confidence_map;
        pub mod expression_detector;
        pub mod expression_display;
        pub mod expression_ranker;
    }
    pub mod infrastructure;
}

pub mod media {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod cycle_logger;
    pub mod detection_cycle;
    pub mod inference_guard;
    pub mod readiness;
    pub mod result_publisher;
    pub mod sampling_loop;
    pub mod sampling_stats;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
}
