mod partitioned;
